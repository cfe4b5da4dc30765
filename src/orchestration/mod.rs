//! # Coordination Logic
//!
//! The transactional core of the system:
//!
//! - [`lifecycle`] - validates and executes order state transitions, one
//!   transaction per operation, publishing events only after commit
//! - [`allocation`] - machine exclusivity (conditional claim/release) and the
//!   idempotent status reconciliation pass

pub mod allocation;
pub mod lifecycle;

pub use allocation::{MachineAllocationGuard, MachineCorrection, SyncReport};
pub use lifecycle::OrderLifecycleController;
