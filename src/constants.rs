//! # System Constants
//!
//! Core constants and enums that define the operational boundaries of the
//! production coordination system: lifecycle event names, broadcast channels,
//! status groupings, and the principal roles recognized by the API and the
//! real-time hub.

use serde::{Deserialize, Serialize};

// Re-export state types for convenience
pub use crate::state_machine::{MachineState as MachineStatus, OrderState as OrderStatus};

/// Lifecycle events emitted after committed state changes
pub mod events {
    // Order lifecycle events
    pub const ORDER_CREATED: &str = "order_created";
    pub const ORDER_STARTED: &str = "order_started";
    pub const ORDER_PAUSED: &str = "order_paused";
    pub const ORDER_RESUMED: &str = "order_resumed";
    pub const ORDER_STOPPED: &str = "order_stopped";
    pub const ORDER_COMPLETED: &str = "order_completed";
    pub const ORDER_CANCELLED: &str = "order_cancelled";

    // Machine events
    pub const MACHINE_STATUS_UPDATED: &str = "machine_status_updated";
    pub const MACHINE_STATUSES_SYNCED: &str = "machine_statuses_synced";

    // Ledger events
    pub const DOWNTIME_RECORDED: &str = "downtime_recorded";
    pub const DOWNTIME_RESOLVED: &str = "downtime_resolved";
    pub const WASTE_RECORDED: &str = "waste_recorded";
}

/// Broadcast channel names clients may subscribe to
pub mod channels {
    pub const GENERAL: &str = "general";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const PRODUCTION: &str = "production";
    pub const MACHINES: &str = "machines";
    pub const ALERTS: &str = "alerts";
    pub const ANALYTICS: &str = "analytics";
    pub const ADMIN: &str = "admin";

    /// Wildcard accepted by `broadcast` to reach every connected client
    pub const ALL: &str = "all";
}

/// Status groupings used by allocation and reconciliation queries
pub mod status_groups {
    use crate::state_machine::OrderState;

    /// Order statuses that hold a machine reservation. A machine referenced
    /// by an order in one of these states must not be claimed by another.
    pub const MACHINE_HOLDING: [OrderState; 3] = [
        OrderState::InProgress,
        OrderState::Paused,
        OrderState::Stopped,
    ];

    /// Predecessor statuses from which `complete` is legal
    pub const COMPLETABLE: [OrderState; 3] = [
        OrderState::InProgress,
        OrderState::Paused,
        OrderState::Stopped,
    ];
}

/// Principal roles carried in bearer claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Supervisor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
        }
    }

    /// Supervisors and admins may trigger administrative operations such as
    /// machine status overrides and reconciliation.
    pub fn is_supervisory(&self) -> bool {
        matches!(self, Role::Supervisor | Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator" => Ok(Role::Operator),
            "supervisor" => Ok(Role::Supervisor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {s}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("supervisor".parse::<Role>().unwrap(), Role::Supervisor);
        assert!("ghost".parse::<Role>().is_err());
        assert!(Role::Admin.is_supervisory());
        assert!(!Role::Operator.is_supervisory());
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
    }
}
