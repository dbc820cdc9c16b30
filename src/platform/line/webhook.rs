//! Webhook receiver.
//!
//! Validates and enqueues deliveries and answers immediately. Payloads are
//! never decoded here; that happens on the dispatcher side of the queue.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::platform::line::signature::{validate_signature, SIGNATURE_HEADER};

/// One accepted webhook POST, moved through the queue untouched.
#[derive(Debug, Clone)]
pub struct RawDelivery {
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

pub type DeliverySender = mpsc::UnboundedSender<RawDelivery>;
pub type DeliveryReceiver = mpsc::UnboundedReceiver<RawDelivery>;

#[derive(Clone)]
struct WebhookState {
    channel_secret: Arc<str>,
    queue: DeliverySender,
}

/// Router serving the callback endpoint; every other path or method is 404.
///
/// Admission is unbounded, so the body size limit is off: an oversized
/// delivery must not turn into a 413.
pub fn router(endpoint: &str, channel_secret: &str, queue: DeliverySender) -> Router {
    let state = WebhookState {
        channel_secret: Arc::from(channel_secret),
        queue,
    };

    Router::new()
        .route(endpoint, post(callback).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

async fn callback(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if !validate_signature(&state.channel_secret, &body, signature) {
        warn!(
            "LINE webhook signature verification failed (signature: {})",
            if signature.is_some() { "invalid" } else { "missing" }
        );
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    }

    debug!("Accepted LINE delivery ({} bytes)", body.len());

    let delivery = RawDelivery {
        body,
        received_at: Utc::now(),
    };
    if state.queue.send(delivery).is_err() {
        // Only happens once the dispatcher has exited, which takes the
        // process down with it.
        error!("Dispatcher is gone; dropping LINE delivery");
    }

    StatusCode::NO_CONTENT.into_response()
}
