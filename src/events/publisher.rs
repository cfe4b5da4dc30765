//! In-process publisher decoupling lifecycle commits from real-time fan-out.
//!
//! The lifecycle controller publishes exactly one event per committed
//! operation, strictly after the transaction commits. The broadcaster hub is
//! the subscriber; the request/response path never waits on delivery.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// A lifecycle event that has been committed and is ready for fan-out
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Event name, one of [`crate::constants::events`]
    pub name: String,
    /// Broadcast channel this event belongs on
    pub channel: String,
    /// Event payload (order/machine representation plus context)
    pub payload: Value,
    /// Principal that triggered the change, when known
    pub actor: Option<String>,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl LifecycleEvent {
    pub fn new(name: impl Into<String>, channel: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
            payload,
            actor: None,
            published_at: chrono::Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// High-throughput event publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Publishing with no subscribers is not an error —
    /// the committed state is authoritative whether or not anyone listens.
    pub fn publish(&self, event: LifecycleEvent) -> Result<(), PublishError> {
        match self.sender.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::default();
        let event = LifecycleEvent::new("order_started", "production", serde_json::json!({}));
        assert!(publisher.publish(event).is_ok());
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let publisher = EventPublisher::new(16);
        let mut rx = publisher.subscribe();

        let event = LifecycleEvent::new(
            "order_completed",
            "production",
            serde_json::json!({"order_id": 7}),
        )
        .with_actor("42");
        publisher.publish(event).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name, "order_completed");
        assert_eq!(received.channel, "production");
        assert_eq!(received.payload["order_id"], 7);
        assert_eq!(received.actor.as_deref(), Some("42"));
    }
}
