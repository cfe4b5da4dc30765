//! # Real-Time Event Broadcaster
//!
//! Connection-oriented pub/sub hub fanning lifecycle and machine events out
//! to authenticated WebSocket clients.
//!
//! - [`protocol`] - client/server JSON frame types
//! - [`channels`] - per-role channel allow-lists
//! - [`registry`] - the concurrent connected-clients registry
//! - [`hub`] - event pump and heartbeat sweep wiring
//!
//! Delivery is fire-and-forget: no queuing, no retry, no guarantee to
//! disconnected clients. The authoritative state committed in the store is
//! unaffected by any delivery failure.

pub mod channels;
pub mod hub;
pub mod protocol;
pub mod registry;

pub use channels::ChannelAcl;
pub use hub::{BroadcastHub, HubStats};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::ClientRegistry;
