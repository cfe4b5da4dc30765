//! # Waste Event Model
//!
//! Append-only scrap records linked to orders. Never mutated, never deleted;
//! consumed by analytics and audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

use crate::error::{MesError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WasteEvent {
    pub id: i64,
    pub order_id: i64,
    pub waste_type: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub cost: Option<f64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

const WASTE_COLUMNS: &str = "id, order_id, waste_type, quantity, unit, cost, created_by, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewWasteEvent {
    pub waste_type: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub cost: Option<f64>,
    pub created_by: Option<i64>,
}

impl WasteEvent {
    pub async fn create(pool: &PgPool, order_id: i64, event: NewWasteEvent) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        Self::create_in(&mut conn, order_id, event).await
    }

    /// Insert inside the caller's transaction; used by `complete` to record
    /// explicitly reported completion scrap atomically with the order update.
    pub async fn create_in(
        conn: &mut PgConnection,
        order_id: i64,
        event: NewWasteEvent,
    ) -> Result<Self> {
        if event.waste_type.trim().is_empty() {
            return Err(MesError::validation("waste_type cannot be empty"));
        }
        if event.quantity <= 0.0 || !event.quantity.is_finite() {
            return Err(MesError::validation("quantity must be a positive number"));
        }

        let sql = format!(
            "INSERT INTO production_waste (order_id, waste_type, quantity, unit, cost, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {WASTE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, WasteEvent>(&sql)
            .bind(order_id)
            .bind(&event.waste_type)
            .bind(event.quantity)
            .bind(&event.unit)
            .bind(event.cost)
            .bind(event.created_by)
            .fetch_one(conn)
            .await?;

        Ok(row)
    }

    pub async fn list_for_order(pool: &PgPool, order_id: i64) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {WASTE_COLUMNS} FROM production_waste WHERE order_id = $1 ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, WasteEvent>(&sql)
            .bind(order_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_in_window(
        pool: &PgPool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {WASTE_COLUMNS} FROM production_waste \
             WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, WasteEvent>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}
