//! # Machine Handlers
//!
//! Machine registry reads, administrative status changes validated against
//! the configured transition table, and the reconciliation endpoint.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::events;
use crate::models::{Machine, Order};
use crate::orchestration::SyncReport;
use crate::state_machine::MachineState;
use crate::web::auth::Claims;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MachineListQuery {
    pub environment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: MachineState,
}

/// Machine representation with its derived current order binding
#[derive(Debug, Serialize)]
pub struct MachineResponse {
    #[serde(flatten)]
    pub machine: Machine,
    /// Order currently holding this machine, derived from the order store —
    /// never stored redundantly on the machine row
    pub current_order: Option<Order>,
}

/// List machines: GET /v1/machines
pub async fn list_machines(
    State(state): State<AppState>,
    Query(query): Query<MachineListQuery>,
) -> ApiResult<Json<Vec<Machine>>> {
    let machines = Machine::list(&state.pool, query.environment.as_deref()).await?;
    Ok(Json(machines))
}

/// Fetch one machine with its bound order: GET /v1/machines/{id}
pub async fn get_machine(
    State(state): State<AppState>,
    Path(machine_id): Path<i64>,
) -> ApiResult<Json<MachineResponse>> {
    let machine = Machine::find_by_id(&state.pool, machine_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Machine {machine_id} not found")))?;

    let current_order = Order::active_for_machine_pool(&state.pool, machine_id)
        .await?
        .into_iter()
        .next();

    Ok(Json(MachineResponse {
        machine,
        current_order,
    }))
}

/// Administrative status change: PATCH /v1/machines/{id}/status
pub async fn set_machine_status(
    State(state): State<AppState>,
    Path(machine_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<Json<Machine>> {
    require_supervisory(&claims)?;

    let machine = Machine::set_status(
        &state.pool,
        machine_id,
        request.status,
        &state.config.transitions.machines,
    )
    .await?;

    info!(machine_id, status = %request.status, "Machine status updated");
    state.hub.broadcast(
        events::MACHINE_STATUS_UPDATED,
        serde_json::json!({ "machine_id": machine_id, "status": request.status }),
        crate::constants::channels::MACHINES,
        None,
    );
    Ok(Json(machine))
}

/// Reconcile machine statuses against bound orders:
/// POST /v1/machines/sync-statuses
pub async fn sync_statuses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SyncReport>> {
    require_supervisory(&claims)?;

    let report = state.guard.sync_statuses().await?;

    for correction in &report.corrected {
        state.hub.broadcast(
            events::MACHINE_STATUS_UPDATED,
            serde_json::json!({
                "machine_id": correction.machine_id,
                "status": correction.to,
            }),
            crate::constants::channels::MACHINES,
            None,
        );
    }
    if let Ok(payload) = serde_json::to_value(&report) {
        state.hub.broadcast(
            events::MACHINE_STATUSES_SYNCED,
            payload,
            crate::constants::channels::MACHINES,
            None,
        );
    }
    Ok(Json(report))
}

fn require_supervisory(claims: &Claims) -> ApiResult<()> {
    if claims.role().map(|r| r.is_supervisory()).unwrap_or(false) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Operation requires supervisor or admin role",
        ))
    }
}
