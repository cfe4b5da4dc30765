//! # Analytics Handlers
//!
//! Read-only OEE reporting over a caller-supplied window.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::analytics::OeeReport;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OeeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub machine_id: Option<i64>,
}

/// OEE report: GET /v1/analytics/oee
pub async fn oee_report(
    State(state): State<AppState>,
    Query(query): Query<OeeQuery>,
) -> ApiResult<Json<OeeReport>> {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or(to - Duration::hours(24));
    if to <= from {
        return Err(ApiError::bad_request("window end must be after start"));
    }

    let report = state.analytics.oee_report(from, to, query.machine_id).await?;
    Ok(Json(report))
}
