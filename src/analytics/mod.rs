//! # Efficiency Analytics
//!
//! Read-side OEE/MTBF/MTTR computation over the downtime ledger and
//! completed orders. Recomputed on demand for a caller-supplied window;
//! nothing here mutates state.

pub mod oee;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::error::{MesError, Result};
use crate::models::{DowntimeEvent, Order};

pub use oee::{OeeInput, OeeMetrics, OeeReport, ReliabilityMetrics, TrendDirection};

/// Query layer feeding the pure computation in [`oee`]
#[derive(Clone)]
pub struct EfficiencyAnalytics {
    pool: PgPool,
}

impl EfficiencyAnalytics {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Full OEE report for the window, with the trend computed against the
    /// preceding window of equal length.
    pub async fn oee_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        machine_id: Option<i64>,
    ) -> Result<OeeReport> {
        if to <= from {
            return Err(MesError::validation("window end must be after start"));
        }

        let current = self.window_input(from, to, machine_id).await?;
        let window_length = to - from;
        let previous = self
            .window_input(from - window_length, from, machine_id)
            .await?;

        Ok(oee::build_report(from, to, &current, &previous))
    }

    async fn window_input(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        machine_id: Option<i64>,
    ) -> Result<OeeInput> {
        let downtime = DowntimeEvent::list_in_window(&self.pool, from, to, machine_id).await?;
        let completed = Order::completed_in_window(&self.pool, from, to, machine_id).await?;

        let total_downtime_seconds: i64 = downtime.iter().filter_map(DowntimeEvent::duration).sum();
        let incident_count = downtime.len() as i64;
        let resolved_count = downtime
            .iter()
            .filter(|d| d.resolution_status == "resolved")
            .count() as i64;

        let production_seconds: i64 = completed
            .iter()
            .filter_map(|o| match (o.start_time, o.complete_time) {
                (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
                _ => None,
            })
            .sum();
        let actual_quantity: i64 = completed
            .iter()
            .filter_map(|o| o.actual_quantity.map(i64::from))
            .sum();
        let planned_quantity: i64 = completed.iter().map(|o| i64::from(o.quantity)).sum();

        Ok(OeeInput {
            planned_time_seconds: (to - from).num_seconds(),
            downtime_seconds: total_downtime_seconds,
            production_seconds,
            actual_quantity,
            planned_quantity,
            incident_count,
            resolved_count,
        })
    }
}

/// Convenience for "last N hours" reports
pub fn window_ending_now(hours: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let to = Utc::now();
    (to - Duration::hours(hours.max(1)), to)
}
