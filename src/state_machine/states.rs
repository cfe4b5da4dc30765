use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle states
///
/// `Paused` is a first-class status rather than a flag on `InProgress`: the
/// pause history is part of the audited lifecycle and the transition table
/// constrains what may follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Initial state when the order is submitted
    Pending,
    /// Order is running on its assigned machine
    InProgress,
    /// Temporarily halted; the machine stays reserved
    Paused,
    /// Halted with a recorded reason; the machine stays reserved
    Stopped,
    /// Finished; quantities recorded and the machine released
    Completed,
    /// Administratively cancelled before completion
    Cancelled,
}

impl OrderState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check if this state holds a machine reservation
    pub fn holds_machine(&self) -> bool {
        matches!(self, Self::InProgress | Self::Paused | Self::Stopped)
    }

    /// Check if this is an active state (order is being worked)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid order state: {s}")),
        }
    }
}

impl Default for OrderState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Machine status values
///
/// Only `Available` and `InUse` are managed by the coordinator; the rest are
/// administrative and reachable solely through the configured machine
/// transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    /// Free to be claimed by a starting order
    Available,
    /// Exclusively bound to one active order
    InUse,
    /// Taken out of the pool for scheduled maintenance
    Maintenance,
    /// Powered down or unreachable
    Offline,
    /// Administratively held without releasing to the pool
    Paused,
}

impl MachineState {
    /// Check if the machine can be claimed by a starting order
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Check if the status is one the coordinator itself manages
    pub fn is_coordinator_managed(&self) -> bool {
        matches!(self, Self::Available | Self::InUse)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::InUse => write!(f, "in_use"),
            Self::Maintenance => write!(f, "maintenance"),
            Self::Offline => write!(f, "offline"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for MachineState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "in_use" => Ok(Self::InUse),
            "maintenance" => Ok(Self::Maintenance),
            "offline" => Ok(Self::Offline),
            "paused" => Ok(Self::Paused),
            _ => Err(format!("Invalid machine state: {s}")),
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::Available
    }
}
