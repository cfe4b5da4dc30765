//! # Downtime & Waste Handlers
//!
//! Append-only ledger endpoints, deliberately independent of the order
//! lifecycle endpoints.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::models::{DowntimeEvent, NewDowntimeEvent, NewWasteEvent, ResolveDowntime, WasteEvent};
use crate::web::auth::Claims;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub machine_id: Option<i64>,
}

impl WindowQuery {
    /// Defaults to the trailing 24 hours
    fn resolve(&self) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to.unwrap_or_else(Utc::now);
        let from = self.from.unwrap_or(to - Duration::hours(24));
        if to <= from {
            return Err(ApiError::bad_request("window end must be after start"));
        }
        Ok((from, to))
    }
}

/// Record downtime against an order: POST /v1/orders/{id}/downtime
pub async fn record_downtime(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(mut request): Json<NewDowntimeEvent>,
) -> ApiResult<Json<DowntimeEvent>> {
    if request.operator_id.is_none() {
        request.operator_id = claims.user_id();
    }
    let record = state.ledger.record_downtime(order_id, request).await?;
    Ok(Json(record))
}

/// Attach resolution to a downtime event: PATCH /v1/downtime/{id}/resolve
pub async fn resolve_downtime(
    State(state): State<AppState>,
    Path(downtime_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(mut request): Json<ResolveDowntime>,
) -> ApiResult<Json<DowntimeEvent>> {
    if request.resolved_by.is_none() {
        request.resolved_by = claims.user_id();
    }
    let record = state.ledger.resolve_downtime(downtime_id, request).await?;
    Ok(Json(record))
}

/// List downtime in a window: GET /v1/downtime
pub async fn list_downtime(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<Vec<DowntimeEvent>>> {
    let (from, to) = query.resolve()?;
    let records = state.ledger.list_downtime(from, to, query.machine_id).await?;
    Ok(Json(records))
}

/// Record waste against an order: POST /v1/orders/{id}/waste
pub async fn record_waste(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(mut request): Json<NewWasteEvent>,
) -> ApiResult<Json<WasteEvent>> {
    if request.created_by.is_none() {
        request.created_by = claims.user_id();
    }
    let record = state.ledger.record_waste(order_id, request).await?;
    Ok(Json(record))
}

/// List waste in a window: GET /v1/waste
pub async fn list_waste(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<Vec<WasteEvent>>> {
    let (from, to) = query.resolve()?;
    let records = state.ledger.list_waste(from, to).await?;
    Ok(Json(records))
}
