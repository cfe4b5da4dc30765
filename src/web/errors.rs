//! # Web API Error Handling
//!
//! Maps the crate error taxonomy onto HTTP statuses with a stable
//! `{error, message}` body. Nothing is silently swallowed at this boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::MesError;

/// Structured API error: status + stable kind + human-readable message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<MesError> for ApiError {
    fn from(error: MesError) -> Self {
        let status = match &error {
            MesError::Validation(_) | MesError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            MesError::Conflict(_) => StatusCode::CONFLICT,
            MesError::NotFound(_) => StatusCode::NOT_FOUND,
            MesError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MesError::Forbidden(_) => StatusCode::FORBIDDEN,
            MesError::Database(_) | MesError::Configuration(_) | MesError::Event(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.kind(), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = %self.kind, message = %self.message, "API error");
        }
        (
            self.status,
            Json(ErrorBody {
                error: &self.kind,
                message: &self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(MesError::invalid_transition("x")).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(MesError::conflict("x")).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(MesError::not_found("x")).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(MesError::Forbidden("x".into())).status,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_kind_survives_mapping() {
        let error = ApiError::from(MesError::conflict("machine taken"));
        assert_eq!(error.kind, "conflict");
        assert!(error.message.contains("machine taken"));
    }
}
