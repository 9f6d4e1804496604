//! Domain event publishing over NATS.

use tracing::{debug, warn};
use crate::domain::events::DomainEvent;

/// Publishes events when a NATS client is configured; otherwise drops them.
/// Failures are logged and never abort the request that raised the event.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn publish(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else {
            debug!(count = events.len(), "NATS not configured, dropping events");
            return;
        };
        for event in events {
            let subject = event.subject();
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%subject, error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "Failed to publish event");
            }
        }
    }
}
