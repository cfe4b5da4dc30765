//! Hub wiring: pumps committed lifecycle events from the in-process
//! publisher into the client registry, and runs the periodic liveness sweep
//! that keeps the registry from accumulating stale connections.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcaster::channels::ChannelAcl;
use crate::broadcaster::protocol::ServerMessage;
use crate::broadcaster::registry::ClientRegistry;
use crate::config::BroadcasterConfig;
use crate::events::EventPublisher;

/// Point-in-time hub figures for health endpoints
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub connected_clients: usize,
}

/// Owns the registry, the ACL, and the background tasks
pub struct BroadcastHub {
    registry: Arc<ClientRegistry>,
    publisher: EventPublisher,
    acl: ChannelAcl,
    config: BroadcasterConfig,
}

impl BroadcastHub {
    pub fn new(publisher: EventPublisher, acl: ChannelAcl, config: BroadcasterConfig) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            publisher,
            acl,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn acl(&self) -> &ChannelAcl {
        &self.acl
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connected_clients: self.registry.len(),
        }
    }

    /// Manual fan-out for callers outside the lifecycle publisher path
    pub fn broadcast(
        &self,
        message_type: &str,
        payload: Value,
        channel: &str,
        room: Option<&str>,
    ) -> usize {
        let frame = ServerMessage::event(message_type, payload, channel);
        self.registry.broadcast(&frame, channel, room)
    }

    /// Spawn the event pump and the heartbeat sweep. Both run for the
    /// process lifetime; the handles are returned for shutdown-aware
    /// callers.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let pump = {
            let hub = Arc::clone(self);
            let mut events = hub.publisher.subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            let frame =
                                ServerMessage::event(&event.name, event.payload, &event.channel);
                            let delivered = hub.registry.broadcast(&frame, &event.channel, None);
                            debug!(
                                event = %event.name,
                                channel = %event.channel,
                                delivered,
                                "Lifecycle event fanned out"
                            );
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            // Fan-out is best-effort; skipped events are gone
                            // and clients resync from the REST surface.
                            warn!(skipped, "Event pump lagged behind publisher");
                        }
                        Err(RecvError::Closed) => {
                            info!("Event publisher closed, stopping pump");
                            break;
                        }
                    }
                }
            })
        };

        let sweep = {
            let hub = Arc::clone(self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(hub.config.heartbeat_interval());
                interval.tick().await; // skip the immediate first tick
                loop {
                    interval.tick().await;
                    let evicted = hub.registry.evict_idle(hub.config.idle_timeout());
                    if !evicted.is_empty() {
                        info!(count = evicted.len(), "Evicted idle connections");
                    }
                }
            })
        };

        (pump, sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::Role;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn hub() -> Arc<BroadcastHub> {
        Arc::new(BroadcastHub::new(
            EventPublisher::new(64),
            ChannelAcl::default(),
            BroadcasterConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_committed_event_reaches_subscriber() {
        let hub = hub();
        let (_pump, _sweep) = hub.spawn_background_tasks();

        let client_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        hub.registry()
            .connect(client_id, "u1".to_string(), Role::Operator, tx);
        hub.registry()
            .subscribe(&client_id, &["production".to_string()]);

        hub.publisher
            .publish(crate::events::LifecycleEvent::new(
                "order_started",
                "production",
                serde_json::json!({"order_id": 1}),
            ))
            .unwrap();

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("pump delivered nothing")
            .expect("channel closed");
        assert_eq!(frame.message_type, "order_started");
        assert_eq!(frame.channel.as_deref(), Some("production"));
    }

    #[tokio::test]
    async fn test_manual_broadcast_counts_deliveries() {
        let hub = hub();
        let client_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        hub.registry()
            .connect(client_id, "u1".to_string(), Role::Supervisor, tx);
        hub.registry()
            .subscribe(&client_id, &["alerts".to_string()]);

        let delivered = hub.broadcast("threshold_alert", serde_json::json!({}), "alerts", None);
        assert_eq!(delivered, 1);
        assert!(rx.try_recv().is_ok());

        let missed = hub.broadcast("threshold_alert", serde_json::json!({}), "analytics", None);
        assert_eq!(missed, 0);
    }
}
