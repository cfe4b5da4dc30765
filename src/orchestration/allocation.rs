//! # Machine Allocation Guard
//!
//! Enforces at-most-one-active-order-per-machine. The "lock" is purely
//! transactional — a single conditional update against the machine row —
//! so exclusivity holds across multiple server instances with no in-process
//! lock manager.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use crate::error::{MesError, Result};
use crate::models::{Machine, Order};
use crate::state_machine::MachineState;

/// One corrected machine in a reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct MachineCorrection {
    pub machine_id: i64,
    pub from: MachineState,
    pub to: MachineState,
}

/// Reconciliation summary returned to the administrative caller
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub examined: usize,
    pub corrected: Vec<MachineCorrection>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.corrected.is_empty()
    }
}

/// Guard over machine exclusivity and status integrity
#[derive(Clone)]
pub struct MachineAllocationGuard {
    pool: PgPool,
}

impl MachineAllocationGuard {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claim a machine inside the caller's transaction.
    ///
    /// Zero affected rows means another caller won the race or the machine
    /// is administratively out of the pool; both surface as `Conflict`. A
    /// missing machine id is distinguished as `NotFound`.
    pub async fn claim(&self, conn: &mut PgConnection, machine_id: i64) -> Result<()> {
        if Machine::claim(&mut *conn, machine_id).await? {
            return Ok(());
        }

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM machines WHERE id = $1")
            .bind(machine_id)
            .fetch_optional(conn)
            .await?;
        match exists {
            None => Err(MesError::not_found(format!(
                "Machine {machine_id} not found"
            ))),
            Some(_) => Err(MesError::conflict(format!(
                "Machine {machine_id} is not available"
            ))),
        }
    }

    /// Release a machine inside the caller's transaction. Unconditional;
    /// only `complete` (and cancellation of a machine-holding order) call it.
    pub async fn release(&self, conn: &mut PgConnection, machine_id: i64) -> Result<()> {
        Machine::release(conn, machine_id).await
    }

    /// Idempotent reconciliation of every machine's status against the set
    /// of non-terminal orders bound to it.
    ///
    /// Each machine is handled in its own short transaction with the machine
    /// row locked, so the pass is safe to run concurrently with live
    /// traffic: a racing `start` either waits for the row lock or has
    /// already claimed, and the conditional correction never fires against a
    /// status that changed underneath. Administrative states (Maintenance,
    /// Offline, Paused) are left alone.
    pub async fn sync_statuses(&self) -> Result<SyncReport> {
        let machine_ids = Machine::all_ids(&self.pool).await?;
        let mut corrected = Vec::new();

        for machine_id in &machine_ids {
            match self.reconcile_machine(*machine_id).await {
                Ok(Some(correction)) => corrected.push(correction),
                Ok(None) => {}
                // Per-machine failures don't abort the sweep; the pass is
                // retryable and the next run picks the machine up again.
                Err(e) => {
                    warn!(machine_id, error = %e, "Reconciliation failed for machine");
                }
            }
        }

        let report = SyncReport {
            examined: machine_ids.len(),
            corrected,
        };
        info!(
            examined = report.examined,
            corrected = report.corrected.len(),
            "Machine status reconciliation complete"
        );
        Ok(report)
    }

    async fn reconcile_machine(&self, machine_id: i64) -> Result<Option<MachineCorrection>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM machines WHERE id = $1 FOR UPDATE")
                .bind(machine_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((status,)) = row else {
            return Ok(None); // machine deleted since the id sweep
        };
        let current: MachineState = status
            .parse()
            .map_err(|_| MesError::Validation(format!("Invalid stored status: {status}")))?;

        let active = Order::active_for_machine(&mut *tx, machine_id).await?;

        let target = match (current, active.is_empty()) {
            // Orphaned in_use with no active order: release the machine
            (MachineState::InUse, true) => Some(MachineState::Available),
            // Available but an active order references it: restore the claim
            (MachineState::Available, false) => Some(MachineState::InUse),
            _ => None,
        };

        let mut correction = None;
        if let Some(target) = target {
            if Machine::correct_status(&mut *tx, machine_id, current, target).await? {
                correction = Some(MachineCorrection {
                    machine_id,
                    from: current,
                    to: target,
                });
            }
        }

        tx.commit().await?;
        Ok(correction)
    }
}
