//! # Web API
//!
//! REST surface plus the WebSocket endpoint. Every REST route under `/v1`
//! sits behind the bearer middleware; the WebSocket handshake authenticates
//! itself via query parameter, and health endpoints are open.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Orders
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/orders/{id}/transitions",
            get(handlers::orders::get_order_transitions),
        )
        .route("/orders/{id}/start", post(handlers::orders::start_order))
        .route("/orders/{id}/pause", post(handlers::orders::pause_order))
        .route("/orders/{id}/resume", post(handlers::orders::resume_order))
        .route("/orders/{id}/stop", post(handlers::orders::stop_order))
        .route(
            "/orders/{id}/complete",
            post(handlers::orders::complete_order),
        )
        .route("/orders/{id}/cancel", post(handlers::orders::cancel_order))
        // Machines
        .route("/machines", get(handlers::machines::list_machines))
        .route("/machines/{id}", get(handlers::machines::get_machine))
        .route(
            "/machines/{id}/status",
            patch(handlers::machines::set_machine_status),
        )
        .route(
            "/machines/sync-statuses",
            post(handlers::machines::sync_statuses),
        )
        // Downtime & waste ledger
        .route(
            "/orders/{id}/downtime",
            post(handlers::ledger::record_downtime),
        )
        .route(
            "/downtime/{id}/resolve",
            patch(handlers::ledger::resolve_downtime),
        )
        .route("/downtime", get(handlers::ledger::list_downtime))
        .route("/orders/{id}/waste", post(handlers::ledger::record_waste))
        .route("/waste", get(handlers::ledger::list_waste))
        // Analytics
        .route("/analytics/oee", get(handlers::analytics::oee_report))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        // The WebSocket handshake authenticates itself; added after the
        // middleware layer so it is not wrapped by it
        .route("/ws", get(handlers::ws::handle_ws));

    let mut router = Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/ready", get(handlers::health::readiness_probe))
        .nest("/v1", api)
        .layer(TraceLayer::new_for_http());

    if state.config.web.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}
