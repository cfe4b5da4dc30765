//! # Machine Model
//!
//! Machine registry rows. The `status` column is the only attribute the
//! coordinator mutates; everything else belongs to administrative
//! collaborators. The conditional `claim` update is the system's sole
//! concurrency-control mechanism for machine exclusivity — no in-process
//! lock, so the invariant holds across multiple server instances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::error::{MesError, Result};
use crate::state_machine::{MachineState, MachineTransitionTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Machine {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub machine_type: Option<String>,
    pub environment: Option<String>,
    pub status: String,
    pub capacity: Option<i32>,
    pub production_rate: Option<f64>,
    pub location: Option<String>,
    pub specifications: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const MACHINE_COLUMNS: &str = "id, name, code, machine_type, environment, status, capacity, \
     production_rate, location, specifications, created_at, updated_at";

impl Machine {
    /// Typed view of the stored status
    pub fn state(&self) -> Result<MachineState> {
        self.status
            .parse()
            .map_err(|_| MesError::Validation(format!("Invalid stored status: {}", self.status)))
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Machine>> {
        let sql = format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE id = $1");
        let machine = sqlx::query_as::<_, Machine>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(machine)
    }

    pub async fn list(pool: &PgPool, environment: Option<&str>) -> Result<Vec<Machine>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE 1=1"));
        if let Some(environment) = environment {
            builder.push(" AND environment = ").push_bind(environment);
        }
        builder.push(" ORDER BY name");

        let machines = builder.build_query_as::<Machine>().fetch_all(pool).await?;
        Ok(machines)
    }

    /// All machine ids; drives the reconciliation sweep
    pub async fn all_ids(pool: &PgPool) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM machines ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Claim the machine for a starting order.
    ///
    /// Single conditional update: zero affected rows means the machine was
    /// not Available — either already claimed, or administratively out of
    /// the pool — and the caller must surface `Conflict`.
    pub async fn claim(conn: &mut PgConnection, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE machines SET status = 'in_use', updated_at = now() \
             WHERE id = $1 AND status = 'available'",
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release the machine back to the pool. Unconditional; invoked only by
    /// `complete`.
    pub async fn release(conn: &mut PgConnection, id: i64) -> Result<()> {
        sqlx::query("UPDATE machines SET status = 'available', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Conditionally correct drift: set `expected → target` only if the row
    /// still holds `expected`. Used by the reconciliation pass so it never
    /// clobbers a concurrent legitimate change.
    pub async fn correct_status(
        conn: &mut PgConnection,
        id: i64,
        expected: MachineState,
        target: MachineState,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE machines SET status = $1, updated_at = now() \
             WHERE id = $2 AND status = $3",
        )
        .bind(target.to_string())
        .bind(id)
        .bind(expected.to_string())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Administrative status change, validated against the configured
    /// transition table. Conditioned on the observed current status so a
    /// racing change surfaces as `Conflict` instead of a lost update.
    pub async fn set_status(
        pool: &PgPool,
        id: i64,
        target: MachineState,
        table: &MachineTransitionTable,
    ) -> Result<Machine> {
        let machine = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| MesError::not_found(format!("Machine {id} not found")))?;
        let current = machine.state()?;

        if !table.allows(current, target) {
            return Err(MesError::invalid_transition(format!(
                "Machine {id} cannot move {current} -> {target}"
            )));
        }

        let sql = format!(
            "UPDATE machines SET status = $1, updated_at = now() \
             WHERE id = $2 AND status = $3 RETURNING {MACHINE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Machine>(&sql)
            .bind(target.to_string())
            .bind(id)
            .bind(current.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                MesError::conflict(format!("Machine {id} status changed concurrently"))
            })?;

        Ok(updated)
    }
}
