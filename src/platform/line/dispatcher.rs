use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::bot::Robot;
use crate::platform::line::api::LineApi;
use crate::platform::line::event::decode_delivery;
use crate::platform::line::profile_cache::ProfileCache;
use crate::platform::line::webhook::{DeliveryReceiver, RawDelivery};
use crate::platform::{Content, NormalizedMessage};

/// Single consumer of the webhook queue.
///
/// Deliveries are handled strictly in enqueue order and events within a
/// delivery in platform order. A robot error ends the loop.
pub struct Dispatcher {
    queue: DeliveryReceiver,
    profiles: ProfileCache,
    robot: Arc<dyn Robot>,
}

impl Dispatcher {
    pub fn new(queue: DeliveryReceiver, api: Arc<dyn LineApi>, robot: Arc<dyn Robot>) -> Self {
        Self {
            queue,
            profiles: ProfileCache::new(api),
            robot,
        }
    }

    /// Run until every queue sender is gone, or the robot fails.
    pub async fn run(mut self) -> Result<()> {
        while let Some(delivery) = self.queue.recv().await {
            self.dispatch(delivery).await?;
        }
        info!("LINE webhook queue closed, dispatcher stopping");
        Ok(())
    }

    async fn dispatch(&mut self, delivery: RawDelivery) -> Result<()> {
        let events = match decode_delivery(&delivery.body) {
            Ok(events) => events,
            Err(e) => {
                warn!("Dropping malformed LINE delivery: {:#}", e);
                return Ok(());
            }
        };

        debug!(
            "Dispatching {} event(s), queued {} ms",
            events.len(),
            (Utc::now() - delivery.received_at).num_milliseconds()
        );

        for event in events {
            if !matches!(event.content, Content::Text(_)) {
                debug!("Skipping non-text {} event {}", event.event_type, event.id);
                continue;
            }

            let from_name = match self.profiles.lookup(&event.from_mid).await {
                Ok(contact) => Some(contact.display_name.clone()),
                Err(e) => {
                    warn!("Profile lookup for {} failed: {:#}", event.from_mid, e);
                    None
                }
            };

            let Some(message) = NormalizedMessage::from_event(event, from_name) else {
                continue;
            };

            debug!("Received: {:?}", message);

            let id = message.id.clone();
            self.robot
                .receive(message)
                .await
                .with_context(|| format!("Robot failed to handle LINE message {}", id))?;
        }

        Ok(())
    }
}
