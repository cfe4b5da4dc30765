//! Broadcaster behavior: channel isolation, role allow-lists, room
//! narrowing, heartbeat eviction, and the committed-event fan-out path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use mes_core::broadcaster::{BroadcastHub, ChannelAcl, ServerMessage};
use mes_core::config::BroadcasterConfig;
use mes_core::constants::Role;
use mes_core::events::{EventPublisher, LifecycleEvent};

fn hub_with_publisher() -> (Arc<BroadcastHub>, EventPublisher) {
    let publisher = EventPublisher::new(64);
    let hub = Arc::new(BroadcastHub::new(
        publisher.clone(),
        ChannelAcl::default(),
        BroadcasterConfig::default(),
    ));
    (hub, publisher)
}

fn connect(
    hub: &BroadcastHub,
    role: Role,
    channels: &[&str],
) -> (Uuid, mpsc::Receiver<ServerMessage>) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(16);
    hub.registry().connect(id, format!("user-{id}"), role, tx);
    let requested: Vec<String> = channels.iter().map(ToString::to_string).collect();
    let (accepted, _rejected) = hub.acl().partition(role, &requested);
    hub.registry().subscribe(&id, &accepted);
    (id, rx)
}

#[tokio::test]
async fn machines_subscriber_does_not_receive_production_events() {
    let (hub, _publisher) = hub_with_publisher();
    let (_machines, mut machines_rx) = connect(&hub, Role::Operator, &["machines"]);
    let (_production, mut production_rx) = connect(&hub, Role::Operator, &["production"]);

    let delivered = hub.broadcast(
        "order_started",
        serde_json::json!({"order_id": 1}),
        "production",
        None,
    );

    assert_eq!(delivered, 1);
    assert!(production_rx.try_recv().is_ok());
    assert!(machines_rx.try_recv().is_err());
}

#[tokio::test]
async fn operator_admin_subscription_is_rejected_not_accepted() {
    let (hub, _publisher) = hub_with_publisher();

    let requested = vec!["admin".to_string(), "general".to_string()];
    let (accepted, rejected) = hub.acl().partition(Role::Operator, &requested);

    assert_eq!(accepted, vec!["general".to_string()]);
    assert_eq!(rejected, vec!["admin".to_string()]);

    // And an admin broadcast cannot reach the operator even if they try
    let (_id, mut rx) = connect(&hub, Role::Operator, &["admin"]);
    let delivered = hub.broadcast("config_changed", serde_json::json!({}), "admin", None);
    assert_eq!(delivered, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn room_scoped_broadcast_skips_other_rooms() {
    let (hub, _publisher) = hub_with_publisher();
    let (line1, mut line1_rx) = connect(&hub, Role::Operator, &["production"]);
    let (line2, mut line2_rx) = connect(&hub, Role::Operator, &["production"]);

    hub.registry().join_room(&line1, "line-1".to_string());
    hub.registry().join_room(&line2, "line-2".to_string());

    let delivered = hub.broadcast(
        "order_paused",
        serde_json::json!({"order_id": 9}),
        "production",
        Some("line-1"),
    );

    assert_eq!(delivered, 1);
    assert!(line1_rx.try_recv().is_ok());
    assert!(line2_rx.try_recv().is_err());
}

#[tokio::test]
async fn committed_lifecycle_event_is_fanned_out() {
    let (hub, publisher) = hub_with_publisher();
    let (_pump, _sweep) = hub.spawn_background_tasks();

    let (_id, mut rx) = connect(&hub, Role::Supervisor, &["production"]);

    publisher
        .publish(LifecycleEvent::new(
            "order_completed",
            "production",
            serde_json::json!({"order_id": 3, "efficiency_percentage": 95.0}),
        ))
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no frame delivered")
        .expect("channel closed");
    assert_eq!(frame.message_type, "order_completed");
    assert_eq!(frame.channel.as_deref(), Some("production"));
    assert_eq!(frame.data["efficiency_percentage"], 95.0);
}

#[tokio::test]
async fn delivery_failure_is_swallowed_and_client_dropped() {
    let (hub, _publisher) = hub_with_publisher();
    let (id, rx) = connect(&hub, Role::Operator, &["general"]);
    drop(rx); // socket gone

    // The broadcast itself must not error; the dead client is pruned.
    let delivered = hub.broadcast("notice", serde_json::json!({}), "general", None);
    assert_eq!(delivered, 0);
    assert!(hub.registry().subscriptions(&id).is_none());
}

#[tokio::test]
async fn idle_clients_are_evicted_fresh_ones_kept() {
    let (hub, _publisher) = hub_with_publisher();
    let (fresh, _fresh_rx) = connect(&hub, Role::Operator, &["general"]);
    let (stale, _stale_rx) = connect(&hub, Role::Operator, &["general"]);

    // Nobody is stale yet
    assert!(hub.registry().evict_idle(Duration::from_secs(60)).is_empty());

    // Everything older than zero seconds is stale except what we touch now
    tokio::time::sleep(Duration::from_millis(20)).await;
    hub.registry().touch(&fresh);
    let evicted = hub.registry().evict_idle(Duration::from_millis(10));

    assert!(evicted.contains(&stale));
    assert!(!evicted.contains(&fresh));
    assert_eq!(hub.registry().len(), 1);
}
