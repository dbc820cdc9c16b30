use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

use crate::platform::line::{self, api::LineApi};
use crate::platform::NormalizedMessage;

/// Entry point of the bot pipeline. Called once per text message, in
/// dispatch order; an error here is fatal to the dispatcher.
#[async_trait]
pub trait Robot: Send + Sync {
    async fn receive(&self, message: NormalizedMessage) -> Result<()>;
}

/// Minimal robot shipped with the binary: answers `ping` and `/help`.
pub struct PingBot {
    api: Arc<dyn LineApi>,
}

impl PingBot {
    pub fn new(api: Arc<dyn LineApi>) -> Self {
        Self { api }
    }

    fn respond(text: &str) -> Option<&'static str> {
        match text.trim() {
            t if t.eq_ignore_ascii_case("ping") => Some("pong"),
            "/help" => Some(
                "Commands:\n\
                 ping - check that the bot is alive\n\
                 /help - show this message",
            ),
            _ => None,
        }
    }
}

#[async_trait]
impl Robot for PingBot {
    async fn receive(&self, message: NormalizedMessage) -> Result<()> {
        info!(
            "LINE message from {} ({}): {}",
            message.from_name.as_deref().unwrap_or("unknown"),
            message.from,
            message.body
        );

        let Some(answer) = Self::respond(&message.body) else {
            return Ok(());
        };

        // A failed reply is this robot's problem, not the dispatcher's.
        if let Err(e) = line::say(self.api.as_ref(), &message.reply(answer)).await {
            error!("Failed to reply to {}: {:#}", message.from, e);
        }
        Ok(())
    }
}
