use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::platform::{Content, Event};

pub const EVENT_TYPE_MESSAGE: &str = "138311609000106303";
pub const EVENT_TYPE_OPERATION: &str = "138311609100106403";
pub const CONTENT_TYPE_TEXT: u64 = 1;

#[derive(Debug, Deserialize)]
struct Delivery {
    #[serde(default)]
    result: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    from_channel: u64,
    #[serde(default)]
    to_channel: u64,
    event_type: String,
    content: WireContent,
}

// Operations (friend added, blocked, ...) carry a much smaller content
// object, so everything here is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    id: Option<String>,
    content_type: Option<u64>,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: Vec<String>,
    created_time: Option<i64>,
    text: Option<String>,
}

fn event_type_name(code: &str) -> String {
    match code {
        EVENT_TYPE_MESSAGE => "message".to_string(),
        EVENT_TYPE_OPERATION => "operation".to_string(),
        other => other.to_string(),
    }
}

/// Millisecond timestamp to UTC. Missing or out-of-range values fall back
/// to the epoch, with a log line so they don't pass unnoticed.
fn created_time(event_id: &str, millis: Option<i64>) -> DateTime<Utc> {
    match millis.map(|ms| (ms, DateTime::<Utc>::from_timestamp_millis(ms))) {
        Some((_, Some(time))) => time,
        Some((ms, None)) => {
            warn!("LINE event {} has out-of-range createdTime {}", event_id, ms);
            DateTime::<Utc>::UNIX_EPOCH
        }
        None => {
            debug!("LINE event {} has no createdTime", event_id);
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        let is_message = wire.event_type == EVENT_TYPE_MESSAGE;
        let content = match (wire.content.content_type, wire.content.text) {
            (Some(CONTENT_TYPE_TEXT), Some(text)) if is_message => Content::Text(text),
            _ => Content::Other,
        };
        let created_time = created_time(&wire.id, wire.content.created_time);

        Event {
            id: wire.content.id.unwrap_or(wire.id),
            from_mid: wire.content.from,
            to_mid: wire.content.to.into_iter().next().unwrap_or_default(),
            from_channel_id: wire.from_channel,
            to_channel_id: wire.to_channel,
            event_type: event_type_name(&wire.event_type),
            created_time,
            content,
        }
    }
}

/// Decode one webhook delivery body into its events, in platform order.
pub fn decode_delivery(body: &[u8]) -> Result<Vec<Event>> {
    let delivery: Delivery =
        serde_json::from_slice(body).context("Failed to parse LINE webhook delivery")?;
    Ok(delivery.result.into_iter().map(Event::from).collect())
}

#[cfg(test)]
pub(crate) fn wire_text(id: &str, from: &str, to: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "from": "u206d25c2ea6bd87c17655609a1c37cb8",
        "fromChannel": 1341301815,
        "to": [to],
        "toChannel": 1441301333,
        "eventType": EVENT_TYPE_MESSAGE,
        "id": format!("WB-{}", id),
        "content": {
            "location": null,
            "id": id,
            "contentType": 1,
            "from": from,
            "createdTime": 1332394961610i64,
            "to": [to],
            "toType": 1,
            "contentMetadata": null,
            "text": text
        }
    })
}

#[cfg(test)]
pub(crate) fn wire_sticker(id: &str, from: &str, to: &str) -> serde_json::Value {
    serde_json::json!({
        "from": "u206d25c2ea6bd87c17655609a1c37cb8",
        "fromChannel": 1341301815,
        "to": [to],
        "toChannel": 1441301333,
        "eventType": EVENT_TYPE_MESSAGE,
        "id": format!("WB-{}", id),
        "content": {
            "id": id,
            "contentType": 8,
            "from": from,
            "createdTime": 1332394961610i64,
            "to": [to],
            "toType": 1,
            "contentMetadata": {"STKPKGID": "1", "STKID": "1", "STKVER": "100"},
            "text": null
        }
    })
}

#[cfg(test)]
pub(crate) fn delivery(events: Vec<serde_json::Value>) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "result": events })).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_message() {
        let body = delivery(vec![wire_text("325708", "Uabc", "Cxyz", "hello")]);
        let events = decode_delivery(&body).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.id, "325708");
        assert_eq!(event.from_mid, "Uabc");
        assert_eq!(event.to_mid, "Cxyz");
        assert_eq!(event.from_channel_id, 1341301815);
        assert_eq!(event.to_channel_id, 1441301333);
        assert_eq!(event.event_type, "message");
        assert_eq!(event.created_time.timestamp_millis(), 1332394961610);
        assert_eq!(event.content, Content::Text("hello".to_string()));
    }

    #[test]
    fn test_non_text_content_is_other() {
        let body = delivery(vec![wire_sticker("1", "Uabc", "Cxyz")]);
        let events = decode_delivery(&body).unwrap();
        assert_eq!(events[0].content, Content::Other);
    }

    #[test]
    fn test_operation_is_other() {
        let body = br#"{"result":[{
            "from":"u206d25c2ea6bd87c17655609a1c37cb8",
            "fromChannel":1341301815,
            "to":["u0cc15697597f61dd8b01cea8b027050e"],
            "toChannel":1441301333,
            "eventType":"138311609100106403",
            "id":"ABCDEF-12345678902",
            "content":{"params":["u0f3bfc598b061eba02183bfc5280886a",null,null],"revision":2469,"opType":4}
        }]}"#;
        let events = decode_delivery(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "operation");
        assert_eq!(events[0].id, "ABCDEF-12345678902");
        assert_eq!(events[0].content, Content::Other);
    }

    #[test]
    fn test_order_is_preserved() {
        let body = delivery(vec![
            wire_text("1", "U1", "B", "first"),
            wire_sticker("2", "U1", "B"),
            wire_text("3", "U2", "B", "third"),
        ]);
        let ids: Vec<String> = decode_delivery(&body)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_unknown_event_type_kept_verbatim() {
        let mut raw = wire_text("1", "U1", "B", "x");
        raw["eventType"] = serde_json::json!("999");
        let events = decode_delivery(&delivery(vec![raw])).unwrap();
        assert_eq!(events[0].event_type, "999");
        assert_eq!(events[0].content, Content::Other);
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(decode_delivery(b"not json").is_err());
        assert!(decode_delivery(br#"{"result":[{"id":"x"}]}"#).is_err());
    }

    #[test]
    fn test_empty_result() {
        assert!(decode_delivery(br#"{"result":[]}"#).unwrap().is_empty());
        assert!(decode_delivery(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_bad_created_time_falls_back_to_epoch() {
        let mut missing = wire_text("1", "U1", "B", "x");
        missing["content"]
            .as_object_mut()
            .unwrap()
            .remove("createdTime");
        let mut out_of_range = wire_text("2", "U1", "B", "y");
        out_of_range["content"]["createdTime"] = serde_json::json!(i64::MAX);

        let events = decode_delivery(&delivery(vec![missing, out_of_range])).unwrap();

        assert_eq!(events[0].created_time, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(events[1].created_time, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(events[1].content, Content::Text("y".to_string()));
    }
}
