use serde::{Deserialize, Serialize};

use super::states::OrderState;

/// Events that can trigger order state transitions
///
/// Each variant carries the payload its lifecycle operation records; the
/// target state is fixed per event and validated against the transition
/// table before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrderEvent {
    /// Claim a machine and begin production
    Start { machine_id: i64, operator_id: i64 },
    /// Halt temporarily, keeping the machine reserved
    Pause {
        reason: String,
        notes: Option<String>,
    },
    /// Continue after a pause or a recoverable stop
    Resume,
    /// Halt with a categorized reason, keeping the machine reserved
    Stop {
        reason: String,
        notes: Option<String>,
        category: Option<String>,
    },
    /// Finish the order, record quantities, release the machine
    Complete {
        actual_quantity: Option<i32>,
        waste_quantity: Option<i32>,
        quality_notes: Option<String>,
        #[serde(default)]
        allow_overrun: bool,
    },
    /// Administrative cancellation; archives the order
    Cancel,
}

impl OrderEvent {
    /// String representation of the event type for logging and audit rows
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause { .. } => "pause",
            Self::Resume => "resume",
            Self::Stop { .. } => "stop",
            Self::Complete { .. } => "complete",
            Self::Cancel => "cancel",
        }
    }

    /// The state this event drives the order into
    pub fn target_state(&self) -> OrderState {
        match self {
            Self::Start { .. } | Self::Resume => OrderState::InProgress,
            Self::Pause { .. } => OrderState::Paused,
            Self::Stop { .. } => OrderState::Stopped,
            Self::Complete { .. } => OrderState::Completed,
            Self::Cancel => OrderState::Cancelled,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Cancel)
    }

    /// The lifecycle event name broadcast after this event commits
    pub fn lifecycle_event_name(&self) -> &'static str {
        use crate::constants::events;
        match self {
            Self::Start { .. } => events::ORDER_STARTED,
            Self::Pause { .. } => events::ORDER_PAUSED,
            Self::Resume => events::ORDER_RESUMED,
            Self::Stop { .. } => events::ORDER_STOPPED,
            Self::Complete { .. } => events::ORDER_COMPLETED,
            Self::Cancel => events::ORDER_CANCELLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_states() {
        let start = OrderEvent::Start {
            machine_id: 1,
            operator_id: 2,
        };
        assert_eq!(start.target_state(), OrderState::InProgress);
        assert_eq!(OrderEvent::Resume.target_state(), OrderState::InProgress);
        assert_eq!(OrderEvent::Cancel.target_state(), OrderState::Cancelled);
    }

    #[test]
    fn test_event_serde_tagging() {
        let event = OrderEvent::Pause {
            reason: "material_shortage".to_string(),
            notes: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pause");
        assert_eq!(json["data"]["reason"], "material_shortage");
    }

    #[test]
    fn test_terminal_events() {
        assert!(OrderEvent::Cancel.is_terminal());
        assert!(!OrderEvent::Resume.is_terminal());
    }
}
