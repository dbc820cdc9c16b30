mod bot;
mod config;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::PingBot;
use crate::config::Config;
use crate::platform::line::LineAdapter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,line_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration: optional TOML file, then LINE_* / WEBHOOK_* env vars
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Channel ID: {}", config.line.channel_id);
    info!("  API: {}", config.line.api_base_url);
    info!(
        "  Webhook: {}{}",
        config.server.socket_addr(),
        config.server.endpoint
    );

    let adapter = LineAdapter::new(config);
    let robot = Arc::new(PingBot::new(adapter.api()));

    info!("Bot is starting...");
    adapter.run(robot).await?;

    Ok(())
}
