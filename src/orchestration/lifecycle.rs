//! # Order Lifecycle Controller
//!
//! Validates and executes order state transitions. Every operation runs in
//! one transaction that re-reads the current order row under lock before
//! mutating, so concurrent callers serialize per order and the loser of any
//! race observes the winner's committed state. Lifecycle events are handed
//! to the publisher strictly after commit — never before, so observers are
//! never told about a mutation that later rolls back.

use sqlx::PgPool;
use tracing::{info, warn};

use crate::constants::{channels, events, status_groups};
use crate::error::{MesError, Result};
use crate::events::{EventPublisher, LifecycleEvent};
use crate::models::core::waste_event::NewWasteEvent;
use crate::models::{Order, OrderTransition, WasteEvent};
use crate::orchestration::allocation::MachineAllocationGuard;
use crate::state_machine::{MachineState, OrderEvent, OrderState, OrderTransitionTable};

const ORDER_COLUMNS: &str = "id, order_number, product_name, product_code, quantity, \
     actual_quantity, status, priority, machine_id, operator_id, created_by, environment, \
     efficiency_percentage, notes, stop_reason, stop_category, quality_notes, archived, \
     due_date, created_at, start_time, paused_at, resumed_at, stop_time, complete_time, \
     updated_at";

/// Parameters for the `complete` operation
#[derive(Debug, Clone, Default)]
pub struct CompletionParams {
    pub actual_quantity: Option<i32>,
    pub waste_quantity: Option<i32>,
    pub quality_notes: Option<String>,
    pub allow_overrun: bool,
}

/// Executes lifecycle operations against the order store and the machine
/// allocation guard
#[derive(Clone)]
pub struct OrderLifecycleController {
    pool: PgPool,
    transitions: OrderTransitionTable,
    guard: MachineAllocationGuard,
    publisher: EventPublisher,
}

impl OrderLifecycleController {
    pub fn new(
        pool: PgPool,
        transitions: OrderTransitionTable,
        guard: MachineAllocationGuard,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            pool,
            transitions,
            guard,
            publisher,
        }
    }

    /// Apply a lifecycle event. Single entry point for event-driven callers;
    /// the REST handlers call the per-operation methods directly.
    pub async fn apply(
        &self,
        order_id: i64,
        event: OrderEvent,
        actor: Option<&str>,
    ) -> Result<Order> {
        match event {
            OrderEvent::Start {
                machine_id,
                operator_id,
            } => self.start(order_id, machine_id, operator_id, actor).await,
            OrderEvent::Pause { reason, notes } => {
                self.pause(order_id, &reason, notes.as_deref(), actor).await
            }
            OrderEvent::Resume => self.resume(order_id, actor).await,
            OrderEvent::Stop {
                reason,
                notes,
                category,
            } => {
                self.stop(
                    order_id,
                    &reason,
                    notes.as_deref(),
                    category.as_deref(),
                    actor,
                )
                .await
            }
            OrderEvent::Complete {
                actual_quantity,
                waste_quantity,
                quality_notes,
                allow_overrun,
            } => {
                self.complete(
                    order_id,
                    CompletionParams {
                        actual_quantity,
                        waste_quantity,
                        quality_notes,
                        allow_overrun,
                    },
                    actor,
                )
                .await
            }
            OrderEvent::Cancel => self.cancel(order_id, actor).await,
        }
    }

    /// Start a pending order on an available machine.
    ///
    /// The machine claim is a conditional single-row update; losing that
    /// race surfaces as `Conflict` while an order already past `Pending`
    /// surfaces as `InvalidTransition`.
    pub async fn start(
        &self,
        order_id: i64,
        machine_id: i64,
        operator_id: i64,
        actor: Option<&str>,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let order = Self::load_for_update(&mut tx, order_id).await?;
        let current = order.state()?;
        if current != OrderState::Pending {
            return Err(MesError::invalid_transition(format!(
                "Order {order_id} is {current}, start requires pending"
            )));
        }
        self.ensure_allowed(order_id, current, OrderState::InProgress)?;

        self.guard.claim(&mut *tx, machine_id).await?;

        let sql = format!(
            "UPDATE production_orders \
             SET status = 'in_progress', start_time = now(), machine_id = $2, \
                 operator_id = $3, updated_at = now() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(machine_id)
            .bind(operator_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MesError::conflict(format!("Order {order_id} changed concurrently")))?;

        OrderTransition::append(
            &mut *tx,
            order_id,
            Some(&current.to_string()),
            "in_progress",
            "start",
            actor,
        )
        .await?;

        tx.commit().await?;

        info!(order_id, machine_id, operator_id, "Order started");
        self.emit_order_event(events::ORDER_STARTED, &updated, actor);
        self.emit_machine_status(machine_id, MachineState::InUse);
        Ok(updated)
    }

    /// Pause a running order. The machine stays reserved — the operator
    /// expects to resume.
    pub async fn pause(
        &self,
        order_id: i64,
        reason: &str,
        notes: Option<&str>,
        actor: Option<&str>,
    ) -> Result<Order> {
        if reason.trim().is_empty() {
            return Err(MesError::validation("pause reason cannot be empty"));
        }

        let mut tx = self.pool.begin().await?;

        let order = Self::load_for_update(&mut tx, order_id).await?;
        let current = order.state()?;
        if current != OrderState::InProgress {
            return Err(MesError::invalid_transition(format!(
                "Order {order_id} is {current}, pause requires in_progress"
            )));
        }
        self.ensure_allowed(order_id, current, OrderState::Paused)?;

        let sql = format!(
            "UPDATE production_orders \
             SET status = 'paused', paused_at = now(), stop_reason = $2, \
                 notes = COALESCE($3, notes), updated_at = now() \
             WHERE id = $1 AND status = 'in_progress' \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(reason)
            .bind(notes)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MesError::conflict(format!("Order {order_id} changed concurrently")))?;

        OrderTransition::append(
            &mut *tx,
            order_id,
            Some(&current.to_string()),
            "paused",
            "pause",
            actor,
        )
        .await?;

        tx.commit().await?;

        info!(order_id, reason, "Order paused");
        self.emit_order_event(events::ORDER_PAUSED, &updated, actor);
        Ok(updated)
    }

    /// Resume a paused or stopped order. The machine was never released, so
    /// availability is not re-checked.
    pub async fn resume(&self, order_id: i64, actor: Option<&str>) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let order = Self::load_for_update(&mut tx, order_id).await?;
        let current = order.state()?;
        if !matches!(current, OrderState::Paused | OrderState::Stopped) {
            return Err(MesError::invalid_transition(format!(
                "Order {order_id} is {current}, resume requires paused or stopped"
            )));
        }
        self.ensure_allowed(order_id, current, OrderState::InProgress)?;

        let sql = format!(
            "UPDATE production_orders \
             SET status = 'in_progress', resumed_at = now(), updated_at = now() \
             WHERE id = $1 AND status = $2 \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(current.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MesError::conflict(format!("Order {order_id} changed concurrently")))?;

        OrderTransition::append(
            &mut *tx,
            order_id,
            Some(&current.to_string()),
            "in_progress",
            "resume",
            actor,
        )
        .await?;

        tx.commit().await?;

        info!(order_id, "Order resumed");
        self.emit_order_event(events::ORDER_RESUMED, &updated, actor);
        Ok(updated)
    }

    /// Stop a running or paused order with a categorized reason. Recoverable:
    /// the machine stays reserved and the order can resume.
    pub async fn stop(
        &self,
        order_id: i64,
        reason: &str,
        notes: Option<&str>,
        category: Option<&str>,
        actor: Option<&str>,
    ) -> Result<Order> {
        if reason.trim().is_empty() {
            return Err(MesError::validation("stop reason cannot be empty"));
        }

        let mut tx = self.pool.begin().await?;

        let order = Self::load_for_update(&mut tx, order_id).await?;
        let current = order.state()?;
        if !matches!(current, OrderState::InProgress | OrderState::Paused) {
            return Err(MesError::invalid_transition(format!(
                "Order {order_id} is {current}, stop requires in_progress or paused"
            )));
        }
        self.ensure_allowed(order_id, current, OrderState::Stopped)?;

        let sql = format!(
            "UPDATE production_orders \
             SET status = 'stopped', stop_time = now(), stop_reason = $2, \
                 stop_category = $3, notes = COALESCE($4, notes), updated_at = now() \
             WHERE id = $1 AND status = $5 \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(reason)
            .bind(category)
            .bind(notes)
            .bind(current.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MesError::conflict(format!("Order {order_id} changed concurrently")))?;

        OrderTransition::append(
            &mut *tx,
            order_id,
            Some(&current.to_string()),
            "stopped",
            "stop",
            actor,
        )
        .await?;

        tx.commit().await?;

        info!(order_id, reason, category, "Order stopped");
        self.emit_order_event(events::ORDER_STOPPED, &updated, actor);
        Ok(updated)
    }

    /// Complete an order: record quantities, compute efficiency, and — unlike
    /// pause/stop — release the machine back to the pool. Terminal.
    pub async fn complete(
        &self,
        order_id: i64,
        params: CompletionParams,
        actor: Option<&str>,
    ) -> Result<Order> {
        if params.waste_quantity.is_some_and(|q| q < 0) {
            return Err(MesError::validation("waste_quantity cannot be negative"));
        }

        let mut tx = self.pool.begin().await?;

        let order = Self::load_for_update(&mut tx, order_id).await?;
        let current = order.state()?;
        if !status_groups::COMPLETABLE.contains(&current) {
            return Err(MesError::invalid_transition(format!(
                "Order {order_id} is {current}, complete requires an active state"
            )));
        }
        self.ensure_allowed(order_id, current, OrderState::Completed)?;

        let actual = resolve_actual_quantity(
            params.actual_quantity,
            order.quantity,
            params.allow_overrun,
        )?;
        let efficiency = compute_efficiency(actual, order.quantity);

        let sql = format!(
            "UPDATE production_orders \
             SET status = 'completed', complete_time = now(), actual_quantity = $2, \
                 efficiency_percentage = $3, quality_notes = COALESCE($4, quality_notes), \
                 updated_at = now() \
             WHERE id = $1 AND status = $5 \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(actual)
            .bind(efficiency)
            .bind(&params.quality_notes)
            .bind(current.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MesError::conflict(format!("Order {order_id} changed concurrently")))?;

        if let Some(waste_quantity) = params.waste_quantity {
            if waste_quantity > 0 {
                WasteEvent::create_in(
                    &mut *tx,
                    order_id,
                    NewWasteEvent {
                        waste_type: "completion_scrap".to_string(),
                        quantity: f64::from(waste_quantity),
                        unit: Some("units".to_string()),
                        cost: None,
                        created_by: order.operator_id,
                    },
                )
                .await?;
            }
        }

        if let Some(machine_id) = order.machine_id {
            self.guard.release(&mut *tx, machine_id).await?;
        }

        OrderTransition::append(
            &mut *tx,
            order_id,
            Some(&current.to_string()),
            "completed",
            "complete",
            actor,
        )
        .await?;

        tx.commit().await?;

        info!(order_id, actual, efficiency, "Order completed");
        self.emit_order_event(events::ORDER_COMPLETED, &updated, actor);
        if let Some(machine_id) = order.machine_id {
            self.emit_machine_status(machine_id, MachineState::Available);
        }
        Ok(updated)
    }

    /// Administrative cancellation from any non-terminal state. Archives the
    /// order (history is never deleted) and releases a held machine so the
    /// exclusivity invariant stays derivable.
    pub async fn cancel(&self, order_id: i64, actor: Option<&str>) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let order = Self::load_for_update(&mut tx, order_id).await?;
        let current = order.state()?;
        if current.is_terminal() {
            return Err(MesError::invalid_transition(format!(
                "Order {order_id} is {current} and cannot be cancelled"
            )));
        }
        self.ensure_allowed(order_id, current, OrderState::Cancelled)?;

        let sql = format!(
            "UPDATE production_orders \
             SET status = 'cancelled', archived = true, updated_at = now() \
             WHERE id = $1 AND status = $2 \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(current.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MesError::conflict(format!("Order {order_id} changed concurrently")))?;

        let held_machine = current.holds_machine().then_some(order.machine_id).flatten();
        if let Some(machine_id) = held_machine {
            self.guard.release(&mut *tx, machine_id).await?;
        }

        OrderTransition::append(
            &mut *tx,
            order_id,
            Some(&current.to_string()),
            "cancelled",
            "cancel",
            actor,
        )
        .await?;

        tx.commit().await?;

        info!(order_id, "Order cancelled");
        self.emit_order_event(events::ORDER_CANCELLED, &updated, actor);
        if let Some(machine_id) = held_machine {
            self.emit_machine_status(machine_id, MachineState::Available);
        }
        Ok(updated)
    }

    async fn load_for_update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: i64,
    ) -> Result<Order> {
        Order::find_for_update(&mut *tx, order_id)
            .await?
            .ok_or_else(|| MesError::not_found(format!("Order {order_id} not found")))
    }

    fn ensure_allowed(&self, order_id: i64, from: OrderState, to: OrderState) -> Result<()> {
        if self.transitions.allows(from, to) {
            Ok(())
        } else {
            Err(MesError::invalid_transition(format!(
                "Order {order_id}: transition {from} -> {to} is not permitted"
            )))
        }
    }

    /// Fan-out happens strictly after commit; a publish failure is logged
    /// and discarded because the state change is already authoritative.
    fn emit_order_event(&self, name: &str, order: &Order, actor: Option<&str>) {
        let payload = match serde_json::to_value(order) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(order_id = order.id, error = %e, "Failed to serialize order event");
                return;
            }
        };
        let mut event = LifecycleEvent::new(name, channels::PRODUCTION, payload);
        if let Some(actor) = actor {
            event = event.with_actor(actor);
        }
        if let Err(e) = self.publisher.publish(event) {
            warn!(order_id = order.id, error = %e, "Failed to publish lifecycle event");
        }
    }

    fn emit_machine_status(&self, machine_id: i64, status: MachineState) {
        let event = LifecycleEvent::new(
            events::MACHINE_STATUS_UPDATED,
            channels::MACHINES,
            serde_json::json!({
                "machine_id": machine_id,
                "status": status,
            }),
        );
        if let Err(e) = self.publisher.publish(event) {
            warn!(machine_id, error = %e, "Failed to publish machine event");
        }
    }
}

/// Default a missing actual quantity to the target; reject negatives and —
/// absent an explicit override — overruns past the target.
fn resolve_actual_quantity(
    requested: Option<i32>,
    target: i32,
    allow_overrun: bool,
) -> Result<i32> {
    let actual = requested.unwrap_or(target);
    if actual < 0 {
        return Err(MesError::validation("actual_quantity cannot be negative"));
    }
    if actual > target && !allow_overrun {
        return Err(MesError::validation(format!(
            "actual_quantity {actual} exceeds target {target}; set allow_overrun to accept"
        )));
    }
    Ok(actual)
}

fn compute_efficiency(actual: i32, target: i32) -> f64 {
    if target <= 0 {
        return 0.0;
    }
    f64::from(actual) / f64::from(target) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efficiency_exact_at_target() {
        assert_eq!(compute_efficiency(100, 100), 100.0);
        assert_eq!(compute_efficiency(95, 100), 95.0);
        assert_eq!(compute_efficiency(0, 100), 0.0);
    }

    #[test]
    fn test_actual_quantity_defaults_to_target() {
        assert_eq!(resolve_actual_quantity(None, 100, false).unwrap(), 100);
        assert_eq!(resolve_actual_quantity(Some(95), 100, false).unwrap(), 95);
    }

    #[test]
    fn test_actual_quantity_overrun_requires_override() {
        assert!(resolve_actual_quantity(Some(110), 100, false).is_err());
        assert_eq!(resolve_actual_quantity(Some(110), 100, true).unwrap(), 110);
    }

    #[test]
    fn test_actual_quantity_rejects_negative() {
        assert!(resolve_actual_quantity(Some(-1), 100, false).is_err());
        assert!(resolve_actual_quantity(Some(-1), 100, true).is_err());
    }
}
