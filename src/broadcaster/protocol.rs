//! WebSocket wire protocol.
//!
//! Client frames are adjacently tagged (`{"type": ..., "data": ...}`);
//! server frames carry the same shape plus the originating channel and a
//! timestamp for event frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → server requests
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        channels: Vec<String>,
    },
    Unsubscribe {
        channels: Vec<String>,
    },
    JoinRoom {
        room: String,
    },
    LeaveRoom {
        #[serde(default)]
        room: Option<String>,
    },
    Ping,
    Heartbeat,
}

/// Server → client frames
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    fn new(message_type: &str, data: Value) -> Self {
        Self {
            message_type: message_type.to_string(),
            data,
            channel: None,
            timestamp: Utc::now(),
        }
    }

    /// Greeting sent immediately after a successful handshake
    pub fn welcome(client_id: &str, user_id: &str, role: &str, allowed_channels: &[String]) -> Self {
        Self::new(
            "welcome",
            serde_json::json!({
                "client_id": client_id,
                "user_id": user_id,
                "role": role,
                "allowed_channels": allowed_channels,
            }),
        )
    }

    /// Response to subscribe/unsubscribe listing what was accepted and what
    /// the role's allow-list silently rejected
    pub fn subscription_confirmed(accepted: &[String], rejected: &[String], subscribed: &[String]) -> Self {
        Self::new(
            "subscription_confirmed",
            serde_json::json!({
                "accepted": accepted,
                "rejected": rejected,
                "subscribed": subscribed,
            }),
        )
    }

    pub fn room_joined(room: &str) -> Self {
        Self::new("room_joined", serde_json::json!({ "room": room }))
    }

    pub fn room_left() -> Self {
        Self::new("room_left", serde_json::json!({}))
    }

    pub fn pong() -> Self {
        Self::new("pong", serde_json::json!({}))
    }

    pub fn heartbeat_ack() -> Self {
        Self::new("heartbeat_ack", serde_json::json!({}))
    }

    /// Explicit error frame; malformed or unauthorized requests are never
    /// silently dropped
    pub fn error(kind: &str, message: &str) -> Self {
        Self::new(
            "error",
            serde_json::json!({ "error": kind, "message": message }),
        )
    }

    /// Lifecycle/machine event frame on a named channel
    pub fn event(name: &str, payload: Value, channel: &str) -> Self {
        let mut message = Self::new(name, payload);
        message.channel = Some(channel.to_string());
        message
    }
}
