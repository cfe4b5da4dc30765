//! Connected-clients registry.
//!
//! The only in-process shared mutable structure in the core. Keyed by
//! connection id and mutated exclusively through the operations below, it is
//! safe under concurrent connect/disconnect/broadcast from the WebSocket
//! sessions, the event pump, and the heartbeat sweep.
//!
//! Client state is never persisted: its lifetime equals the lifetime of the
//! connection that created it.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::Role;

use super::protocol::ServerMessage;

/// Per-connection state for one authenticated client
#[derive(Debug)]
pub struct BroadcastClient {
    pub user_id: String,
    pub role: Role,
    pub channels: HashSet<String>,
    pub room: Option<String>,
    pub last_activity: Instant,
    sender: mpsc::Sender<ServerMessage>,
}

/// Concurrent registry of connected clients
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<Uuid, BroadcastClient>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection
    pub fn connect(
        &self,
        id: Uuid,
        user_id: String,
        role: Role,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        self.clients.insert(
            id,
            BroadcastClient {
                user_id,
                role,
                channels: HashSet::new(),
                room: None,
                last_activity: Instant::now(),
                sender,
            },
        );
        debug!(client_id = %id, connected = self.clients.len(), "Client connected");
    }

    /// Remove a connection; dropping the sender ends the session's outbound
    /// loop if it is still running
    pub fn disconnect(&self, id: &Uuid) {
        if self.clients.remove(id).is_some() {
            debug!(client_id = %id, connected = self.clients.len(), "Client disconnected");
        }
    }

    /// Add accepted channels to a client's subscription set; returns the
    /// resulting set
    pub fn subscribe(&self, id: &Uuid, channels: &[String]) -> Vec<String> {
        match self.clients.get_mut(id) {
            Some(mut client) => {
                client.channels.extend(channels.iter().cloned());
                let mut subscribed: Vec<String> = client.channels.iter().cloned().collect();
                subscribed.sort();
                subscribed
            }
            None => Vec::new(),
        }
    }

    pub fn unsubscribe(&self, id: &Uuid, channels: &[String]) -> Vec<String> {
        match self.clients.get_mut(id) {
            Some(mut client) => {
                for channel in channels {
                    client.channels.remove(channel);
                }
                let mut subscribed: Vec<String> = client.channels.iter().cloned().collect();
                subscribed.sort();
                subscribed
            }
            None => Vec::new(),
        }
    }

    pub fn join_room(&self, id: &Uuid, room: String) {
        if let Some(mut client) = self.clients.get_mut(id) {
            client.room = Some(room);
        }
    }

    pub fn leave_room(&self, id: &Uuid) {
        if let Some(mut client) = self.clients.get_mut(id) {
            client.room = None;
        }
    }

    /// Refresh the liveness clock for a connection
    pub fn touch(&self, id: &Uuid) {
        if let Some(mut client) = self.clients.get_mut(id) {
            client.last_activity = Instant::now();
        }
    }

    /// Fan a frame out to every client subscribed to `channel` (or to the
    /// special channel `all`), narrowed by room when one is given.
    ///
    /// Fire-and-forget: a closed or saturated client channel is logged, the
    /// client is dropped from the registry, and the caller never sees an
    /// error — the triggering state change has already committed.
    pub fn broadcast(
        &self,
        message: &ServerMessage,
        channel: &str,
        room: Option<&str>,
    ) -> usize {
        let mut delivered = 0;
        let mut dead: Vec<Uuid> = Vec::new();

        for entry in self.clients.iter() {
            let client = entry.value();
            let channel_matches =
                channel == crate::constants::channels::ALL || client.channels.contains(channel);
            if !channel_matches {
                continue;
            }
            if let Some(room) = room {
                if client.room.as_deref() != Some(room) {
                    continue;
                }
            }

            match client.sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(client_id = %entry.key(), "Client outbound buffer full, dropping connection");
                    dead.push(*entry.key());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(*entry.key());
                }
            }
        }

        for id in dead {
            self.disconnect(&id);
        }
        delivered
    }

    /// Direct frame to one client (protocol replies)
    pub fn send_to(&self, id: &Uuid, message: ServerMessage) {
        if let Some(client) = self.clients.get(id) {
            if client.sender.try_send(message).is_err() {
                drop(client);
                self.disconnect(id);
            }
        }
    }

    /// Drop every connection idle past the timeout; returns the evicted ids.
    /// Dropping the registry entry closes the session's outbound channel,
    /// which terminates its socket loop.
    pub fn evict_idle(&self, timeout: Duration) -> Vec<Uuid> {
        let now = Instant::now();
        let stale: Vec<Uuid> = self
            .clients
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_activity) > timeout)
            .map(|entry| *entry.key())
            .collect();

        for id in &stale {
            warn!(client_id = %id, "Evicting idle client");
            self.disconnect(id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Snapshot of a client's subscriptions, for tests and diagnostics
    pub fn subscriptions(&self, id: &Uuid) -> Option<Vec<String>> {
        self.clients.get(id).map(|c| {
            let mut channels: Vec<String> = c.channels.iter().cloned().collect();
            channels.sort();
            channels
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(registry: &ClientRegistry, role: Role) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(8);
        registry.connect(id, format!("user-{id}"), role, tx);
        (id, rx)
    }

    #[tokio::test]
    async fn test_channel_isolation() {
        let registry = ClientRegistry::new();
        let (machines_client, mut machines_rx) = client(&registry, Role::Operator);
        let (production_client, mut production_rx) = client(&registry, Role::Operator);

        registry.subscribe(&machines_client, &["machines".to_string()]);
        registry.subscribe(&production_client, &["production".to_string()]);

        let frame = ServerMessage::event("order_started", serde_json::json!({}), "production");
        let delivered = registry.broadcast(&frame, "production", None);

        assert_eq!(delivered, 1);
        assert!(production_rx.try_recv().is_ok());
        assert!(machines_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_all_reaches_every_client() {
        let registry = ClientRegistry::new();
        let (a, mut rx_a) = client(&registry, Role::Operator);
        let (_b, mut rx_b) = client(&registry, Role::Supervisor);

        registry.subscribe(&a, &["general".to_string()]);
        // second client has no subscriptions at all

        let frame = ServerMessage::event("system_notice", serde_json::json!({}), "all");
        let delivered = registry.broadcast(&frame, "all", None);

        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_room_narrowing() {
        let registry = ClientRegistry::new();
        let (in_room, mut in_rx) = client(&registry, Role::Operator);
        let (out_of_room, mut out_rx) = client(&registry, Role::Operator);

        for id in [&in_room, &out_of_room] {
            registry.subscribe(id, &["production".to_string()]);
        }
        registry.join_room(&in_room, "line-1".to_string());

        let frame = ServerMessage::event("order_paused", serde_json::json!({}), "production");
        let delivered = registry.broadcast(&frame, "production", Some("line-1"));

        assert_eq!(delivered, 1);
        assert!(in_rx.try_recv().is_ok());
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_client_removed_on_broadcast() {
        let registry = ClientRegistry::new();
        let (id, rx) = client(&registry, Role::Operator);
        registry.subscribe(&id, &["general".to_string()]);
        drop(rx); // simulate a vanished socket

        let frame = ServerMessage::event("order_started", serde_json::json!({}), "general");
        let delivered = registry.broadcast(&frame, "general", None);

        assert_eq!(delivered, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_idle_eviction() {
        let registry = ClientRegistry::new();
        let (stale, _stale_rx) = client(&registry, Role::Operator);
        let (fresh, _fresh_rx) = client(&registry, Role::Operator);

        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.touch(&fresh);

        let evicted = registry.evict_idle(Duration::from_millis(25));
        assert_eq!(evicted, vec![stale]);
        assert_eq!(registry.len(), 1);
        assert!(registry.subscriptions(&fresh).is_some());
    }

    #[tokio::test]
    async fn test_unsubscribe_shrinks_set() {
        let registry = ClientRegistry::new();
        let (id, _rx) = client(&registry, Role::Supervisor);

        registry.subscribe(&id, &["alerts".to_string(), "general".to_string()]);
        let remaining = registry.unsubscribe(&id, &["alerts".to_string()]);
        assert_eq!(remaining, vec!["general".to_string()]);
    }
}
