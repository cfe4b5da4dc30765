// State machine module for order lifecycle and machine status management
//
// Defines the status enums, the events that drive order transitions, and the
// configurable transition tables validated on every state change. The
// transactional execution of transitions lives in `crate::orchestration`.

pub mod events;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use events::OrderEvent;
pub use states::{MachineState, OrderState};
pub use transitions::{MachineTransitionTable, OrderTransitionTable, TransitionsConfig};
