//! # Authentication Middleware
//!
//! Bearer-token authentication for the REST surface. Validated claims are
//! inserted into request extensions for handlers to consume. The WebSocket
//! handshake authenticates separately (token via query parameter) because
//! browsers cannot set headers on upgrade requests.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::web::auth::{extract_bearer_token, Claims};
use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// Authentication middleware for protected endpoints
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // With auth disabled every request runs as a local admin; handlers can
    // always rely on claims being present.
    if !state.authenticator.enabled() {
        debug!("Authentication disabled - allowing request");
        request.extensions_mut().insert(Claims::local_admin());
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get("authorization")
        .ok_or_else(|| ApiError::auth_error("Missing authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::auth_error("Invalid authorization header format"))?;

    let token =
        extract_bearer_token(auth_str).map_err(|e| ApiError::auth_error(e.to_string()))?;

    let claims = state.authenticator.validate_token(token).map_err(|e| {
        warn!(error = %e, "Bearer token validation failed");
        ApiError::auth_error("Invalid or expired token")
    })?;

    debug!(user = %claims.sub, role = %claims.role, "Authenticated request");

    // Add claims to request extensions for handlers to access
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
