//! # Order Model
//!
//! Production order rows and the queries over them. An order is the unit of
//! production work: a target quantity against a product, moving through the
//! lifecycle graph while (from `start` to `complete`) holding exclusive claim
//! on one machine.
//!
//! Lifecycle mutations never go through plain updates here; they are executed
//! by [`crate::orchestration::lifecycle`] inside a transaction that re-reads
//! the row and conditions every write on the expected current status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::error::{MesError, Result};
use crate::state_machine::OrderState;

/// Represents a production order row.
///
/// `status` is stored as text and validated against [`OrderState`]; use
/// [`Order::state`] for the typed view. `machine_id` is populated while the
/// order holds a machine and retained afterwards for history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub product_name: String,
    pub product_code: Option<String>,
    pub quantity: i32,
    pub actual_quantity: Option<i32>,
    pub status: String,
    pub priority: String,
    pub machine_id: Option<i64>,
    pub operator_id: Option<i64>,
    pub created_by: Option<i64>,
    pub environment: Option<String>,
    pub efficiency_percentage: Option<f64>,
    pub notes: Option<String>,
    pub stop_reason: Option<String>,
    pub stop_category: Option<String>,
    pub quality_notes: Option<String>,
    pub archived: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = "id, order_number, product_name, product_code, quantity, \
     actual_quantity, status, priority, machine_id, operator_id, created_by, environment, \
     efficiency_percentage, notes, stop_reason, stop_category, quality_notes, archived, \
     due_date, created_at, start_time, paused_at, resumed_at, stop_time, complete_time, \
     updated_at";

/// New order for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub product_name: String,
    pub product_code: Option<String>,
    pub quantity: i32,
    #[serde(default)]
    pub priority: Option<String>,
    pub environment: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
}

/// Listing filters; all optional, combined with AND
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub machine_id: Option<i64>,
    pub environment: Option<String>,
    /// Include archived orders; defaults to false
    #[serde(default)]
    pub include_archived: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Order {
    /// Typed view of the stored status
    pub fn state(&self) -> Result<OrderState> {
        self.status
            .parse()
            .map_err(|_| MesError::Validation(format!("Invalid stored status: {}", self.status)))
    }

    /// Create a new order in `Pending`
    pub async fn create(pool: &PgPool, new_order: NewOrder) -> Result<Order> {
        if new_order.quantity <= 0 {
            return Err(MesError::validation("quantity must be a positive integer"));
        }
        if new_order.order_number.trim().is_empty() {
            return Err(MesError::validation("order_number cannot be empty"));
        }
        if new_order.product_name.trim().is_empty() {
            return Err(MesError::validation("product_name cannot be empty"));
        }
        let priority = match new_order.priority.as_deref() {
            None | Some("") => crate::constants::Priority::Normal,
            Some(p) => p.parse().map_err(MesError::Validation)?,
        };

        let sql = format!(
            "INSERT INTO production_orders \
             (order_number, product_name, product_code, quantity, status, priority, \
              environment, due_date, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(&new_order.order_number)
            .bind(&new_order.product_name)
            .bind(&new_order.product_code)
            .bind(new_order.quantity)
            .bind(OrderState::Pending.to_string())
            .bind(priority.as_str())
            .bind(&new_order.environment)
            .bind(new_order.due_date)
            .bind(&new_order.notes)
            .bind(new_order.created_by)
            .fetch_one(pool)
            .await?;

        Ok(order)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM production_orders WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(order)
    }

    /// Row-locked read inside a transaction. Serializes concurrent lifecycle
    /// operations on the same order: the loser of the race observes the
    /// winner's committed status and fails its precondition check.
    pub async fn find_for_update(conn: &mut PgConnection, id: i64) -> Result<Option<Order>> {
        let sql =
            format!("SELECT {ORDER_COLUMNS} FROM production_orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(order)
    }

    pub async fn list(pool: &PgPool, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM production_orders WHERE 1=1"
        ));

        if !filter.include_archived {
            builder.push(" AND archived = false");
        }
        if let Some(status) = &filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(machine_id) = filter.machine_id {
            builder.push(" AND machine_id = ").push_bind(machine_id);
        }
        if let Some(environment) = &filter.environment {
            builder.push(" AND environment = ").push_bind(environment);
        }
        builder.push(" ORDER BY created_at DESC");
        builder
            .push(" LIMIT ")
            .push_bind(filter.limit.unwrap_or(100).clamp(1, 500));
        builder
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        let orders = builder.build_query_as::<Order>().fetch_all(pool).await?;
        Ok(orders)
    }

    /// Orders currently holding the given machine. Under the exclusivity
    /// invariant this returns at most one row; the reconciliation pass uses
    /// the count to detect drift.
    pub async fn active_for_machine(conn: &mut PgConnection, machine_id: i64) -> Result<Vec<Order>> {
        let holding: Vec<String> = crate::constants::status_groups::MACHINE_HOLDING
            .iter()
            .map(ToString::to_string)
            .collect();

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM production_orders \
             WHERE machine_id = $1 \
               AND archived = false \
               AND status = ANY($2)"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(machine_id)
            .bind(holding)
            .fetch_all(conn)
            .await?;
        Ok(orders)
    }

    /// Pool variant of [`Order::active_for_machine`] for read-only callers
    pub async fn active_for_machine_pool(pool: &PgPool, machine_id: i64) -> Result<Vec<Order>> {
        let mut conn = pool.acquire().await?;
        Self::active_for_machine(&mut conn, machine_id).await
    }

    /// Completed orders whose completion falls inside the window, optionally
    /// restricted to one machine. Feeds the quality and performance factors
    /// of the OEE computation.
    pub async fn completed_in_window(
        pool: &PgPool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        machine_id: Option<i64>,
    ) -> Result<Vec<Order>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM production_orders \
             WHERE status = 'completed' AND complete_time >= "
        ));
        builder.push_bind(from);
        builder.push(" AND complete_time < ").push_bind(to);
        if let Some(machine_id) = machine_id {
            builder.push(" AND machine_id = ").push_bind(machine_id);
        }
        builder.push(" ORDER BY complete_time");

        let orders = builder.build_query_as::<Order>().fetch_all(pool).await?;
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parsing() {
        let order = sample_order("paused");
        assert_eq!(order.state().unwrap(), OrderState::Paused);

        let broken = sample_order("exploded");
        assert!(broken.state().is_err());
    }

    fn sample_order(status: &str) -> Order {
        Order {
            id: 1,
            order_number: "ORD-001".to_string(),
            product_name: "Widget".to_string(),
            product_code: None,
            quantity: 100,
            actual_quantity: None,
            status: status.to_string(),
            priority: "normal".to_string(),
            machine_id: None,
            operator_id: None,
            created_by: None,
            environment: None,
            efficiency_percentage: None,
            notes: None,
            stop_reason: None,
            stop_category: None,
            quality_notes: None,
            archived: false,
            due_date: None,
            created_at: Utc::now(),
            start_time: None,
            paused_at: None,
            resumed_at: None,
            stop_time: None,
            complete_time: None,
            updated_at: Utc::now(),
        }
    }
}
