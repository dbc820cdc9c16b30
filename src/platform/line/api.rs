use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LineConfig;

const SEND_TO_CHANNEL: u64 = 1383378250;
const SEND_EVENT_TYPE: &str = "138311608800106203";
const CONTENT_TYPE_TEXT: u64 = 1;
const TO_TYPE_USER: u64 = 1;

/// Profile record returned by the profile endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct Contact {
    pub mid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    contacts: Vec<Contact>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    to: [&'a str; 1],
    to_channel: u64,
    event_type: &'a str,
    content: SendContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendContent<'a> {
    content_type: u64,
    to_type: u64,
    text: &'a str,
}

/// The LINE BOT API capability used by the adapter.
#[async_trait]
pub trait LineApi: Send + Sync {
    /// Look up profiles for a user mid. The API may return zero contacts.
    async fn get_user_profile(&self, mid: &str) -> Result<Vec<Contact>>;

    /// Send a plain text message to a single user.
    async fn send_text(&self, to_mid: &str, text: &str) -> Result<()>;
}

pub struct LineClient {
    client: reqwest::Client,
    config: LineConfig,
}

impl LineClient {
    pub fn new(config: LineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Line-ChannelID", &self.config.channel_id)
            .header("X-Line-ChannelSecret", &self.config.channel_secret)
            .header("X-Line-Trusted-User-With-ACL", &self.config.channel_mid)
    }
}

async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        anyhow::bail!("LINE {} failed ({}): {}", what, status, error_body);
    }
    Ok(response)
}

#[async_trait]
impl LineApi for LineClient {
    async fn get_user_profile(&self, mid: &str) -> Result<Vec<Contact>> {
        let url = format!("{}/v1/profiles", self.config.api_base_url);

        debug!("Fetching LINE profile for {}", mid);

        let response = self
            .authorized(self.client.get(&url).query(&[("mids", mid)]))
            .send()
            .await
            .context("Failed to send profile request to LINE")?;

        let profiles: ProfileResponse = ensure_success(response, "profile lookup")
            .await?
            .json()
            .await
            .context("Failed to parse LINE profile response")?;

        Ok(profiles.contacts)
    }

    async fn send_text(&self, to_mid: &str, text: &str) -> Result<()> {
        let url = format!("{}/v1/events", self.config.api_base_url);
        let request = SendRequest {
            to: [to_mid],
            to_channel: SEND_TO_CHANNEL,
            event_type: SEND_EVENT_TYPE,
            content: SendContent {
                content_type: CONTENT_TYPE_TEXT,
                to_type: TO_TYPE_USER,
                text,
            },
        };

        debug!("Sending LINE text to {}", to_mid);

        let response = self
            .authorized(self.client.post(&url))
            .header("Content-Type", "application/json; charset=UTF-8")
            .json(&request)
            .send()
            .await
            .context("Failed to send message to LINE")?;

        ensure_success(response, "send").await?;
        Ok(())
    }
}
