//! # Order Transition Audit Trail
//!
//! Every committed lifecycle change appends one row here, inside the same
//! transaction as the order mutation itself. The `sort_key`/`most_recent`
//! pair gives both a total per-order ordering and an O(1) current-state
//! lookup without scanning history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderTransition {
    pub id: i64,
    pub order_id: i64,
    pub from_state: Option<String>,
    pub to_state: String,
    pub sort_key: i32,
    pub most_recent: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

const TRANSITION_COLUMNS: &str =
    "id, order_id, from_state, to_state, sort_key, most_recent, metadata, created_at";

impl OrderTransition {
    /// Append a transition inside the caller's transaction.
    ///
    /// Must share the transaction with the order update it records, so the
    /// audit trail can never disagree with the row it describes.
    pub async fn append(
        conn: &mut PgConnection,
        order_id: i64,
        from_state: Option<&str>,
        to_state: &str,
        event: &str,
        actor: Option<&str>,
    ) -> Result<()> {
        let metadata = serde_json::json!({
            "event": event,
            "actor": actor,
            "timestamp": Utc::now(),
        });

        let next_key: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sort_key), 0) + 1 FROM order_transitions WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "UPDATE order_transitions SET most_recent = false \
             WHERE order_id = $1 AND most_recent = true",
        )
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO order_transitions \
             (order_id, from_state, to_state, sort_key, most_recent, metadata) \
             VALUES ($1, $2, $3, $4, true, $5)",
        )
        .bind(order_id)
        .bind(from_state)
        .bind(to_state)
        .bind(next_key.0)
        .bind(metadata)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Full per-order history in transition order
    pub async fn list_for_order(pool: &PgPool, order_id: i64) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM order_transitions \
             WHERE order_id = $1 ORDER BY sort_key"
        );
        let rows = sqlx::query_as::<_, OrderTransition>(&sql)
            .bind(order_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Latest recorded state, if any transition has been written
    pub async fn current_state(pool: &PgPool, order_id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT to_state FROM order_transitions \
             WHERE order_id = $1 AND most_recent = true \
             ORDER BY sort_key DESC LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(state,)| state))
    }
}
