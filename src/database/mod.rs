//! # Database Operations
//!
//! Connection management and schema migration for the coordination core.
//!
//! - [`connection`] - Pool construction from typed configuration
//!
//! Schema migrations live in `migrations/` and are embedded at compile time
//! via `sqlx::migrate!`, so a deployed binary can bring a fresh database up
//! to date without the source tree.

pub mod connection;

pub use connection::DatabaseConnection;

/// Embedded migrations, applied at startup by the server binary
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
