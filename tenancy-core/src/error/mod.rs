//! Unified error handling for Tenancy Core

use crate::domain::QuoteStatus;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Broken role assignments or access configuration. Never resolved by retrying.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Lifecycle transition not declared in the allowed-transition table.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },

    /// The gateway was asked for something it must never do (e.g. bypass on a scoped table).
    #[error("Scope violation: {0}")]
    ScopeViolation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg.clone())
            }
            AppError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "invalid_transition", self.to_string())
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "Access configuration is invalid for this account".to_string(),
                )
            }
            AppError::ScopeViolation(msg) => {
                tracing::error!("Scope violation: {}", msg);
                (
                    StatusCode::FORBIDDEN,
                    "forbidden",
                    "Operation is not permitted".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "jwt_error",
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::NotFound("Quote version not found".to_string());
        assert_eq!(err.to_string(), "Not found: Quote version not found");
    }

    #[test]
    fn test_error_conversion() {
        let err: AppError = anyhow::anyhow!("Something went wrong").into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = AppError::InvalidTransition {
            from: QuoteStatus::Draft,
            to: QuoteStatus::Accepted,
        };
        assert_eq!(err.to_string(), "Invalid transition from draft to accepted");
    }

    #[test]
    fn test_invalid_transition_maps_to_conflict() {
        let response = AppError::InvalidTransition {
            from: QuoteStatus::Sent,
            to: QuoteStatus::Draft,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_scope_violation_is_forbidden() {
        let response = AppError::ScopeViolation("bypass on accounts".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_configuration_error_is_server_error() {
        let response = AppError::Configuration("two tenants".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Internal(anyhow::anyhow!("timeout")).is_transient());
        assert!(!AppError::Configuration("bad role".to_string()).is_transient());
    }
}
