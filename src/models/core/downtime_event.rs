//! # Downtime Event Model
//!
//! Append-only stop incidents. Deliberately decoupled from the order
//! lifecycle: a supervisor may log downtime against an order in any status,
//! and pausing an order never auto-creates a row here. Rows are only ever
//! mutated to attach an end time and resolution, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::error::{MesError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DowntimeEvent {
    pub id: i64,
    pub order_id: i64,
    pub reason: String,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub notes: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Estimate supplied at creation; replaced by the measured span once an
    /// end time is recorded
    pub duration_seconds: Option<i32>,
    pub resolution_status: String,
    pub cost_estimate: Option<f64>,
    pub operator_id: Option<i64>,
    pub resolved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

const DOWNTIME_COLUMNS: &str = "id, order_id, reason, category, severity, notes, start_time, \
     end_time, duration_seconds, resolution_status, cost_estimate, operator_id, resolved_by, \
     created_at, resolved_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewDowntimeEvent {
    pub reason: String,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub notes: Option<String>,
    /// Defaults to now when omitted
    pub start_time: Option<DateTime<Utc>>,
    /// Duration estimate for incidents logged without an end time
    pub estimated_duration_seconds: Option<i32>,
    pub cost_estimate: Option<f64>,
    pub operator_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveDowntime {
    /// Defaults to now when omitted
    pub end_time: Option<DateTime<Utc>>,
    /// `investigating` or `resolved`
    pub resolution_status: String,
    pub resolved_by: Option<i64>,
}

/// Valid resolution states, in escalation order
const RESOLUTION_STATES: [&str; 3] = ["pending", "investigating", "resolved"];

impl DowntimeEvent {
    /// Effective duration: measured span when ended, estimate otherwise
    pub fn duration(&self) -> Option<i64> {
        match self.end_time {
            Some(end) => Some((end - self.start_time).num_seconds().max(0)),
            None => self.duration_seconds.map(i64::from),
        }
    }

    pub async fn create(pool: &PgPool, order_id: i64, event: NewDowntimeEvent) -> Result<Self> {
        if event.reason.trim().is_empty() {
            return Err(MesError::validation("reason cannot be empty"));
        }
        if let Some(estimate) = event.estimated_duration_seconds {
            if estimate < 0 {
                return Err(MesError::validation("duration estimate cannot be negative"));
            }
        }

        let sql = format!(
            "INSERT INTO production_stops \
             (order_id, reason, category, severity, notes, start_time, duration_seconds, \
              cost_estimate, operator_id, resolution_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending') \
             RETURNING {DOWNTIME_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DowntimeEvent>(&sql)
            .bind(order_id)
            .bind(&event.reason)
            .bind(&event.category)
            .bind(&event.severity)
            .bind(&event.notes)
            .bind(event.start_time.unwrap_or_else(Utc::now))
            .bind(event.estimated_duration_seconds)
            .bind(event.cost_estimate)
            .bind(event.operator_id)
            .fetch_one(pool)
            .await?;

        Ok(row)
    }

    /// Attach resolution fields. The only mutation the ledger permits; the
    /// duration is recomputed from the recorded end time.
    pub async fn resolve(pool: &PgPool, id: i64, resolution: ResolveDowntime) -> Result<Self> {
        if !RESOLUTION_STATES.contains(&resolution.resolution_status.as_str()) {
            return Err(MesError::validation(format!(
                "Invalid resolution status: {}",
                resolution.resolution_status
            )));
        }

        let end_time = resolution.end_time.unwrap_or_else(Utc::now);
        let sql = format!(
            "UPDATE production_stops \
             SET end_time = $1, \
                 duration_seconds = GREATEST(EXTRACT(EPOCH FROM ($1 - start_time))::int, 0), \
                 resolution_status = $2, resolved_by = $3, resolved_at = now() \
             WHERE id = $4 \
             RETURNING {DOWNTIME_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DowntimeEvent>(&sql)
            .bind(end_time)
            .bind(&resolution.resolution_status)
            .bind(resolution.resolved_by)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| MesError::not_found(format!("Downtime event {id} not found")))?;

        Ok(row)
    }

    /// Incidents whose start falls inside the window, optionally restricted
    /// to one machine (via the owning order's machine assignment).
    pub async fn list_in_window(
        pool: &PgPool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        machine_id: Option<i64>,
    ) -> Result<Vec<Self>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {DOWNTIME_COLUMNS} FROM production_stops WHERE start_time >= "
        ));
        builder.push_bind(from);
        builder.push(" AND start_time < ").push_bind(to);
        if let Some(machine_id) = machine_id {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM production_orders o \
                     WHERE o.id = production_stops.order_id AND o.machine_id = ",
                )
                .push_bind(machine_id)
                .push(")");
        }
        builder.push(" ORDER BY start_time");

        let rows = builder
            .build_query_as::<DowntimeEvent>()
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(start: DateTime<Utc>, end: Option<DateTime<Utc>>, estimate: Option<i32>) -> DowntimeEvent {
        DowntimeEvent {
            id: 1,
            order_id: 1,
            reason: "jam".to_string(),
            category: None,
            severity: None,
            notes: None,
            start_time: start,
            end_time: end,
            duration_seconds: estimate,
            resolution_status: "pending".to_string(),
            cost_estimate: None,
            operator_id: None,
            resolved_by: None,
            created_at: start,
            resolved_at: None,
        }
    }

    #[test]
    fn test_duration_prefers_measured_span() {
        let start = Utc::now();
        let event = sample(start, Some(start + Duration::seconds(600)), Some(120));
        assert_eq!(event.duration(), Some(600));
    }

    #[test]
    fn test_duration_falls_back_to_estimate() {
        let event = sample(Utc::now(), None, Some(120));
        assert_eq!(event.duration(), Some(120));

        let unknown = sample(Utc::now(), None, None);
        assert_eq!(unknown.duration(), None);
    }
}
