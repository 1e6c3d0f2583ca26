//! Registrar: API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use registrar_core::error::{EnrollmentError, ErrorCategory};
use registrar_remote::ClientBuildError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A catalog or directory client could not be built.
    #[error("remote client error: {0}")]
    RemoteClient(#[from] ClientBuildError),

    /// Tracing or span export could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `EnrollmentError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub EnrollmentError);

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match self.0.category() {
            ErrorCategory::Validation => (StatusCode::BAD_REQUEST, "validation_error"),
            ErrorCategory::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorCategory::CapacityExceeded => (StatusCode::CONFLICT, "capacity_exceeded"),
            ErrorCategory::Duplicate => (StatusCode::CONFLICT, "duplicate_enrollment"),
            ErrorCategory::IllegalStateTransition => {
                (StatusCode::CONFLICT, "illegal_state_transition")
            }
            ErrorCategory::Conflict => (StatusCode::CONFLICT, "conflict"),
            ErrorCategory::UpstreamUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
            }
            ErrorCategory::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
