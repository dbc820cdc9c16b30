pub mod api;
pub mod dispatcher;
pub mod event;
pub mod profile_cache;
pub mod signature;
pub mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bot::Robot;
use crate::config::Config;
use crate::platform::line::api::{LineApi, LineClient};
use crate::platform::line::dispatcher::Dispatcher;
use crate::platform::OutgoingMessage;

/// Send `message.body` to the sender of the message being answered.
/// No retry; platform errors go back to the caller.
pub async fn say(api: &dyn LineApi, message: &OutgoingMessage) -> Result<()> {
    debug!("Sending: {:?}", message.body);
    api.send_text(&message.original.from_mid, &message.body)
        .await
        .with_context(|| format!("Failed to send LINE text to {}", message.original.from_mid))
}

/// Wires the webhook receiver, the queue and the dispatcher together.
pub struct LineAdapter {
    config: Config,
    api: Arc<dyn LineApi>,
}

impl LineAdapter {
    pub fn new(config: Config) -> Self {
        let api = Arc::new(LineClient::new(config.line.clone()));
        Self { config, api }
    }

    /// The platform client, for robots that need to reply.
    pub fn api(&self) -> Arc<dyn LineApi> {
        Arc::clone(&self.api)
    }

    /// Serve the webhook until Ctrl-C, then drain the queue.
    ///
    /// Returns early with an error if the dispatcher fails.
    pub async fn run(self, robot: Arc<dyn Robot>) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut dispatch_task = tokio::spawn(Dispatcher::new(rx, self.api(), robot).run());

        let server_config = &self.config.server;
        let app = webhook::router(&server_config.endpoint, &self.config.line.channel_secret, tx);

        let addr = server_config.socket_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        info!(
            "LINE webhook listening on http://{}{}",
            addr, server_config.endpoint
        );

        let server = async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        };

        tokio::select! {
            served = server => {
                served.context("Webhook server error")?;
            }
            joined = &mut dispatch_task => {
                joined.context("Dispatcher task panicked")??;
                anyhow::bail!("Dispatcher stopped while the webhook server was running");
            }
        }

        // The router, and with it the last queue sender, is gone now.
        info!("Webhook server stopped, draining queued deliveries");
        dispatch_task.await.context("Dispatcher task panicked")?
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::bot::Robot;
    use crate::platform::line::api::{Contact, LineApi};
    use crate::platform::NormalizedMessage;

    /// In-memory LINE API that records every call.
    #[derive(Default)]
    pub struct FakeLine {
        profiles: HashMap<String, Contact>,
        profile_calls: Mutex<Vec<String>>,
        sent: Mutex<Vec<(String, String)>>,
        fail_send: bool,
    }

    impl FakeLine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_profile(self, mid: &str, display_name: &str) -> Self {
            self.with_alias(mid, mid, display_name)
        }

        /// Looking up `queried` answers with a contact whose mid is `actual`.
        pub fn with_alias(mut self, queried: &str, actual: &str, display_name: &str) -> Self {
            self.profiles.insert(
                queried.to_string(),
                Contact {
                    mid: actual.to_string(),
                    display_name: display_name.to_string(),
                    picture_url: None,
                    status_message: None,
                },
            );
            self
        }

        pub fn failing_send(mut self) -> Self {
            self.fail_send = true;
            self
        }

        pub fn profile_calls(&self) -> Vec<String> {
            self.profile_calls.lock().unwrap().clone()
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LineApi for FakeLine {
        async fn get_user_profile(&self, mid: &str) -> Result<Vec<Contact>> {
            self.profile_calls.lock().unwrap().push(mid.to_string());
            Ok(self.profiles.get(mid).cloned().into_iter().collect())
        }

        async fn send_text(&self, to_mid: &str, text: &str) -> Result<()> {
            if self.fail_send {
                anyhow::bail!("LINE send failed (500 Internal Server Error)");
            }
            self.sent
                .lock()
                .unwrap()
                .push((to_mid.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Robot that keeps what it receives and can be told to fail.
    #[derive(Default)]
    pub struct RecordingRobot {
        received: Mutex<Vec<NormalizedMessage>>,
        fail_on: Option<String>,
    }

    impl RecordingRobot {
        pub fn failing_on(body: &str) -> Self {
            Self {
                received: Mutex::new(Vec::new()),
                fail_on: Some(body.to_string()),
            }
        }

        pub fn received(&self) -> Vec<NormalizedMessage> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Robot for RecordingRobot {
        async fn receive(&self, message: NormalizedMessage) -> Result<()> {
            if self.fail_on.as_deref() == Some(message.body.as_str()) {
                anyhow::bail!("handler blew up on {:?}", message.body);
            }
            self.received.lock().unwrap().push(message);
            Ok(())
        }
    }
}
