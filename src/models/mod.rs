//! # Data Models
//!
//! Complete data layer for the coordination core. Each model maps one table
//! and owns the queries over it; multi-table transactional logic lives in
//! [`crate::orchestration`].

pub mod core;

// Re-export core models for easy access
pub use core::downtime_event::{DowntimeEvent, NewDowntimeEvent, ResolveDowntime};
pub use core::machine::Machine;
pub use core::order::{NewOrder, Order, OrderFilter};
pub use core::order_transition::OrderTransition;
pub use core::waste_event::{NewWasteEvent, WasteEvent};
