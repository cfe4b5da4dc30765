#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # MES Core
//!
//! Rust core for coordinating production orders and machines on a factory
//! floor: a transactional order lifecycle, exclusive machine allocation, an
//! append-only downtime/waste ledger, OEE analytics, and a real-time event
//! broadcaster for connected dashboards and tablets.
//!
//! ## Architecture
//!
//! Lifecycle operations are short transactions against PostgreSQL: each one
//! re-reads the current order row under lock, validates the requested
//! transition against a configurable table, applies conditional updates
//! (zero affected rows surfaces as a conflict), appends an audit row, and
//! only after commit hands the resulting event to the broadcaster. Machine
//! exclusivity rests on a single conditional update — no in-process lock —
//! so the invariant holds across server instances sharing one database.
//!
//! ## Module Organization
//!
//! - [`models`] - Data layer: orders, machines, ledger rows, audit trail
//! - [`state_machine`] - Status enums and configurable transition tables
//! - [`orchestration`] - Lifecycle controller and machine allocation guard
//! - [`ledger`] - Downtime & waste ledger service
//! - [`analytics`] - OEE/MTBF/MTTR computation
//! - [`events`] - In-process post-commit event publisher
//! - [`broadcaster`] - Connected-clients registry, channel ACL, fan-out hub
//! - [`web`] - REST + WebSocket surface
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mes_core::config::MesConfig;
//! use mes_core::web::{router, AppState};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = MesConfig::default();
//! config.auth.secret = "shared-secret".into();
//!
//! let state = AppState::build(Arc::new(config), pool)?;
//! let (_pump, _sweep) = state.hub.spawn_background_tasks();
//! let app = router(state);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod broadcaster;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod web;

pub use config::{
    AuthConfig, BroadcasterConfig, ChannelsConfig, ConfigManager, DatabaseConfig, MesConfig,
    WebConfig,
};
pub use constants::{MachineStatus, OrderStatus, Priority, Role};
pub use error::{MesError, Result};
pub use events::{EventPublisher, LifecycleEvent};
pub use models::{DowntimeEvent, Machine, Order, OrderTransition, WasteEvent};
pub use orchestration::{MachineAllocationGuard, OrderLifecycleController, SyncReport};
pub use state_machine::{MachineState, OrderState, TransitionsConfig};
