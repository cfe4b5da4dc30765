//! # Health Check Handlers
//!
//! Liveness and readiness endpoints for monitoring and load balancing.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::Row;
use tracing::debug;

use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

/// Basic health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    status: String,
    timestamp: String,
    database: String,
    connected_clients: usize,
}

/// Liveness: GET /health
///
/// Always available while the process runs.
pub async fn basic_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness: GET /ready
///
/// Probes database connectivity and reports broadcaster occupancy.
pub async fn readiness_probe(State(state): State<AppState>) -> ApiResult<Json<ReadinessResponse>> {
    debug!("Performing readiness probe");

    let row = sqlx::query("SELECT 1 as health")
        .fetch_one(&state.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Database probe failed: {e}")))?;
    let healthy: i32 = row.get("health");

    Ok(Json(ReadinessResponse {
        status: if healthy == 1 { "ready" } else { "not_ready" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: "healthy".to_string(),
        connected_clients: state.hub.stats().connected_clients,
    }))
}
