pub mod line;

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Content of a platform event. Only text is processed further.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Other,
}

/// One decoded notification from a webhook delivery
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub struct Event {
    pub id: String,
    pub from_mid: String,
    pub to_mid: String,
    pub from_channel_id: u64,
    pub to_channel_id: u64,
    /// "message", "operation", or the raw platform code when unknown
    pub event_type: String,
    pub created_time: DateTime<Utc>,
    pub content: Content,
}

/// A message handed to the bot pipeline, decoupled from the platform event shape.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub struct NormalizedMessage {
    pub id: String,
    pub from: String,
    /// Sender display name; `None` when the profile lookup failed
    pub from_name: Option<String>,
    pub to: String,
    pub kind: String,
    pub body: String,
    pub created_time: DateTime<Utc>,
    /// Read-only back-reference used to address replies
    pub original: Arc<Event>,
}

impl NormalizedMessage {
    /// Build from a text event. Returns `None` for any other content.
    pub fn from_event(event: Event, from_name: Option<String>) -> Option<Self> {
        let body = match &event.content {
            Content::Text(text) => text.clone(),
            Content::Other => return None,
        };
        let original = Arc::new(event);
        Some(Self {
            id: original.id.clone(),
            from: original.from_mid.clone(),
            from_name,
            to: original.to_mid.clone(),
            kind: original.event_type.clone(),
            body,
            created_time: original.created_time,
            original,
        })
    }

    /// Address a reply back to whoever sent this message
    pub fn reply(&self, body: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage {
            body: body.into(),
            original: Arc::clone(&self.original),
        }
    }
}

/// A message going back out through the platform
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub body: String,
    pub original: Arc<Event>,
}

impl From<&NormalizedMessage> for OutgoingMessage {
    fn from(message: &NormalizedMessage) -> Self {
        message.reply(message.body.clone())
    }
}

#[cfg(test)]
pub(crate) fn text_event(id: &str, from: &str, to: &str, text: &str) -> Event {
    Event {
        id: id.to_string(),
        from_mid: from.to_string(),
        to_mid: to.to_string(),
        from_channel_id: 1341301815,
        to_channel_id: 1441301333,
        event_type: "message".to_string(),
        created_time: DateTime::from_timestamp_millis(1332394961610).unwrap(),
        content: Content::Text(text.to_string()),
    }
}
