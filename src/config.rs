use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub line: LineConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineConfig {
    pub channel_id: String,
    pub channel_secret: String,
    pub channel_mid: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub endpoint: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

// Loose file representation: every field is optional so the environment can
// fill in whatever the file leaves out.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    line: RawLine,
    #[serde(default)]
    server: RawServer,
}

#[derive(Debug, Deserialize, Default)]
struct RawLine {
    channel_id: Option<String>,
    channel_secret: Option<String>,
    channel_mid: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawServer {
    bind_address: Option<String>,
    port: Option<u16>,
    endpoint: Option<String>,
}

fn default_api_base_url() -> String {
    "https://trialbot-api.line.me".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4567
}

fn default_endpoint() -> String {
    "/callback".to_string()
}

impl RawConfig {
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LINE_CHANNEL_ID") {
            self.line.channel_id = Some(v);
        }
        if let Some(v) = lookup("LINE_CHANNEL_SECRET") {
            self.line.channel_secret = Some(v);
        }
        if let Some(v) = lookup("LINE_CHANNEL_MID") {
            self.line.channel_mid = Some(v);
        }
        if let Some(v) = lookup("LINE_API_BASE_URL") {
            self.line.api_base_url = Some(v);
        }
        if let Some(v) = lookup("WEBHOOK_BIND_ADDRESS") {
            self.server.bind_address = Some(v);
        }
        if let Some(v) = lookup("WEBHOOK_PORT") {
            let port = v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("WEBHOOK_PORT is not a valid port: {}", v))?;
            self.server.port = Some(port);
        }
        if let Some(v) = lookup("WEBHOOK_ENDPOINT") {
            self.server.endpoint = Some(v);
        }
        Ok(())
    }

    fn into_config(self) -> Result<Config> {
        let channel_id = required(self.line.channel_id, "channel_id", "LINE_CHANNEL_ID")?;
        let channel_secret = required(
            self.line.channel_secret,
            "channel_secret",
            "LINE_CHANNEL_SECRET",
        )?;
        let channel_mid = required(self.line.channel_mid, "channel_mid", "LINE_CHANNEL_MID")?;

        let endpoint = self.server.endpoint.unwrap_or_else(default_endpoint);
        if !endpoint.starts_with('/') {
            anyhow::bail!("Webhook endpoint must start with '/': {}", endpoint);
        }

        Ok(Config {
            line: LineConfig {
                channel_id,
                channel_secret,
                channel_mid,
                api_base_url: self
                    .line
                    .api_base_url
                    .unwrap_or_else(default_api_base_url)
                    .trim_end_matches('/')
                    .to_string(),
            },
            server: ServerConfig {
                bind_address: self.server.bind_address.unwrap_or_else(default_bind_address),
                port: self.server.port.unwrap_or_else(default_port),
                endpoint,
            },
        })
    }
}

fn required(value: Option<String>, key: &str, env: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => anyhow::bail!("Missing [line] {} (or {} env var)", key, env),
    }
}

impl Config {
    /// Load from a TOML file (optional) and then the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?
        } else {
            String::new()
        };
        Self::from_parts(&content, |key| std::env::var(key).ok())
    }

    fn from_parts<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw: RawConfig = toml::from_str(content).context("Failed to parse config file")?;
        raw.apply_env(lookup)?;
        raw.into_config()
    }
}
