//! Structured error handling for the coordination core.
//!
//! Every fallible operation in the crate surfaces one of these kinds. The web
//! layer maps them onto HTTP statuses; the broadcaster intentionally swallows
//! delivery failures (see `broadcaster::registry`) because the authoritative
//! state has already committed by the time fan-out runs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MesError {
    /// Malformed input, rejected before any transaction is opened.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The entity's current state does not permit the requested transition.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Optimistic concurrency lost: another caller changed the row first.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Order or machine id unknown.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking the role for this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Event error: {0}")]
    Event(String),
}

impl MesError {
    /// Stable machine-readable kind, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Database(_) => "database_error",
            Self::Configuration(_) => "configuration_error",
            Self::Event(_) => "event_error",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MesError>;
