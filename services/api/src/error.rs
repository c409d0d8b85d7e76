//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how every
//! failure is rendered at the request boundary.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chapterhouse_core::{CoreError, PortError};
use serde_json::json;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A failure reported by one of the core services.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(core) => match core {
                CoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::EmptyEmail | CoreError::InvalidEmailFormat => StatusCode::BAD_REQUEST,
                CoreError::Unauthenticated
                | CoreError::SessionExpired
                | CoreError::InvalidCode
                | CoreError::ExpiredCode => StatusCode::UNAUTHORIZED,
                CoreError::Forbidden => StatusCode::FORBIDDEN,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Port(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for programmatic callers.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Core(core) => match core {
                CoreError::Validation(_) => "VALIDATION_ERROR",
                CoreError::Unauthenticated => "UNAUTHENTICATED",
                CoreError::Forbidden => "FORBIDDEN",
                CoreError::EmptyEmail => "EMPTY_EMAIL",
                CoreError::InvalidEmailFormat => "INVALID_EMAIL_FORMAT",
                CoreError::SessionExpired => "SESSION_EXPIRED",
                CoreError::InvalidCode => "INVALID_CODE",
                CoreError::ExpiredCode => "EXPIRED_CODE",
                CoreError::NotFound(_) => "NOT_FOUND",
                CoreError::Port(_) => "INTERNAL_ERROR",
            },
            ApiError::Port(PortError::NotFound(_)) => "NOT_FOUND",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Core(CoreError::Validation(errors)) => json!({
                "error": true,
                "code": self.code(),
                "message": "Validation failed",
                "errors": errors.full_messages(),
                "field_errors": errors.fields(),
            }),
            _ if status.is_server_error() => {
                // Internals stay in the log.
                error!("Request failed: {}", self);
                json!({
                    "error": true,
                    "code": self.code(),
                    "message": "An unexpected internal error occurred",
                })
            }
            _ => json!({
                "error": true,
                "code": self.code(),
                "message": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
