//! # Order Handlers
//!
//! Order CRUD plus the lifecycle endpoints. Every lifecycle endpoint returns
//! the updated order representation or a structured error; the transactional
//! semantics live in [`crate::orchestration::lifecycle`], not here.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;

use crate::constants::{channels, events};
use crate::models::{NewOrder, Order, OrderFilter, OrderTransition};
use crate::orchestration::lifecycle::CompletionParams;
use crate::web::auth::Claims;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartOrderRequest {
    pub machine_id: i64,
    /// Defaults to the numeric subject of the caller's token
    pub operator_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PauseOrderRequest {
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StopOrderRequest {
    pub reason: String,
    pub notes: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteOrderRequest {
    pub actual_quantity: Option<i32>,
    pub waste_quantity: Option<i32>,
    pub quality_notes: Option<String>,
    #[serde(default)]
    pub allow_overrun: bool,
}

/// Create a new order: POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(mut request): Json<NewOrder>,
) -> ApiResult<Json<Order>> {
    if request.created_by.is_none() {
        request.created_by = claims.user_id();
    }

    info!(order_number = %request.order_number, "Creating order");
    let order = Order::create(&state.pool, request).await?;

    if let Ok(payload) = serde_json::to_value(&order) {
        state
            .hub
            .broadcast(events::ORDER_CREATED, payload, channels::PRODUCTION, None);
    }
    Ok(Json(order))
}

/// List orders: GET /v1/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = Order::list(&state.pool, &filter).await?;
    Ok(Json(orders))
}

/// Fetch one order: GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<Order>> {
    let order = Order::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Order {order_id} not found")))?;
    Ok(Json(order))
}

/// Audit trail for one order: GET /v1/orders/{id}/transitions
pub async fn get_order_transitions(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<Vec<OrderTransition>>> {
    let transitions = OrderTransition::list_for_order(&state.pool, order_id).await?;
    Ok(Json(transitions))
}

/// Start a pending order on a machine: POST /v1/orders/{id}/start
pub async fn start_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<StartOrderRequest>,
) -> ApiResult<Json<Order>> {
    let operator_id = request
        .operator_id
        .or_else(|| claims.user_id())
        .ok_or_else(|| ApiError::bad_request("operator_id required"))?;

    let order = state
        .controller
        .start(order_id, request.machine_id, operator_id, Some(&claims.sub))
        .await?;
    Ok(Json(order))
}

/// Pause a running order: POST /v1/orders/{id}/pause
pub async fn pause_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<PauseOrderRequest>,
) -> ApiResult<Json<Order>> {
    let order = state
        .controller
        .pause(
            order_id,
            &request.reason,
            request.notes.as_deref(),
            Some(&claims.sub),
        )
        .await?;
    Ok(Json(order))
}

/// Resume a paused or stopped order: POST /v1/orders/{id}/resume
pub async fn resume_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Order>> {
    let order = state.controller.resume(order_id, Some(&claims.sub)).await?;
    Ok(Json(order))
}

/// Stop an order with a categorized reason: POST /v1/orders/{id}/stop
pub async fn stop_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<StopOrderRequest>,
) -> ApiResult<Json<Order>> {
    let order = state
        .controller
        .stop(
            order_id,
            &request.reason,
            request.notes.as_deref(),
            request.category.as_deref(),
            Some(&claims.sub),
        )
        .await?;
    Ok(Json(order))
}

/// Complete an order: POST /v1/orders/{id}/complete
pub async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CompleteOrderRequest>,
) -> ApiResult<Json<Order>> {
    let params = CompletionParams {
        actual_quantity: request.actual_quantity,
        waste_quantity: request.waste_quantity,
        quality_notes: request.quality_notes,
        allow_overrun: request.allow_overrun,
    };
    let order = state
        .controller
        .complete(order_id, params, Some(&claims.sub))
        .await?;
    Ok(Json(order))
}

/// Cancel and archive an order: POST /v1/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Order>> {
    let supervisory = claims.role().map(|r| r.is_supervisory()).unwrap_or(false);
    if !supervisory {
        return Err(ApiError::forbidden(
            "Cancellation requires supervisor or admin role",
        ));
    }

    let order = state.controller.cancel(order_id, Some(&claims.sub)).await?;
    Ok(Json(order))
}
