//! # Downtime & Waste Ledger
//!
//! Append-only event log for stop incidents and scrap, independent of the
//! order lifecycle: a supervisor may log downtime against an order in any
//! status, and pausing an order never writes here. That decoupling is
//! deliberate — downtime *reasons* for analytics are a separate concern from
//! the order's pause/stop *state*.

use sqlx::PgPool;
use tracing::{info, warn};

use crate::constants::{channels, events};
use crate::error::{MesError, Result};
use crate::events::{EventPublisher, LifecycleEvent};
use crate::models::{
    DowntimeEvent, NewDowntimeEvent, NewWasteEvent, Order, ResolveDowntime, WasteEvent,
};

/// Service surface over the two append-only ledgers
#[derive(Clone)]
pub struct DowntimeWasteLedger {
    pool: PgPool,
    publisher: EventPublisher,
}

impl DowntimeWasteLedger {
    pub fn new(pool: PgPool, publisher: EventPublisher) -> Self {
        Self { pool, publisher }
    }

    /// Record a stop incident against an order, in any lifecycle status
    pub async fn record_downtime(
        &self,
        order_id: i64,
        event: NewDowntimeEvent,
    ) -> Result<DowntimeEvent> {
        self.ensure_order_exists(order_id).await?;
        let record = DowntimeEvent::create(&self.pool, order_id, event).await?;

        info!(
            downtime_id = record.id,
            order_id,
            reason = %record.reason,
            "Downtime recorded"
        );
        self.emit(
            events::DOWNTIME_RECORDED,
            channels::ALERTS,
            serde_json::to_value(&record),
        );
        Ok(record)
    }

    /// Attach end time and resolution to an incident; the only mutation the
    /// ledger permits
    pub async fn resolve_downtime(
        &self,
        downtime_id: i64,
        resolution: ResolveDowntime,
    ) -> Result<DowntimeEvent> {
        let record = DowntimeEvent::resolve(&self.pool, downtime_id, resolution).await?;

        info!(
            downtime_id,
            status = %record.resolution_status,
            "Downtime resolved"
        );
        self.emit(
            events::DOWNTIME_RESOLVED,
            channels::ALERTS,
            serde_json::to_value(&record),
        );
        Ok(record)
    }

    /// Record scrap against an order
    pub async fn record_waste(&self, order_id: i64, event: NewWasteEvent) -> Result<WasteEvent> {
        self.ensure_order_exists(order_id).await?;
        let record = WasteEvent::create(&self.pool, order_id, event).await?;

        info!(
            waste_id = record.id,
            order_id,
            waste_type = %record.waste_type,
            "Waste recorded"
        );
        self.emit(
            events::WASTE_RECORDED,
            channels::NOTIFICATIONS,
            serde_json::to_value(&record),
        );
        Ok(record)
    }

    pub async fn list_downtime(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
        machine_id: Option<i64>,
    ) -> Result<Vec<DowntimeEvent>> {
        DowntimeEvent::list_in_window(&self.pool, from, to, machine_id).await
    }

    pub async fn list_waste(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<WasteEvent>> {
        WasteEvent::list_in_window(&self.pool, from, to).await
    }

    async fn ensure_order_exists(&self, order_id: i64) -> Result<()> {
        Order::find_by_id(&self.pool, order_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| MesError::not_found(format!("Order {order_id} not found")))
    }

    fn emit(
        &self,
        name: &str,
        channel: &str,
        payload: std::result::Result<serde_json::Value, serde_json::Error>,
    ) {
        match payload {
            Ok(payload) => {
                if let Err(e) = self
                    .publisher
                    .publish(LifecycleEvent::new(name, channel, payload))
                {
                    warn!(event = name, error = %e, "Failed to publish ledger event");
                }
            }
            Err(e) => warn!(event = name, error = %e, "Failed to serialize ledger event"),
        }
    }
}
