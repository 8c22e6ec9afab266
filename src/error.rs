/// Unified error types for Slated
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum SlatedError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors (missing/invalid credentials)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Expired but otherwise well-formed credential. Kept distinct from
    /// Authentication so callers can refresh instead of forcing re-login.
    #[error("Token expired")]
    TokenExpired,

    /// Validation errors (user-correctable input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate signup, double-linked platform account)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient upstream failures (publisher API, OAuth endpoints)
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Email delivery errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert SlatedError to HTTP response
impl IntoResponse for SlatedError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            SlatedError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            SlatedError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "ExpiredToken",
                self.to_string(),
            ),
            SlatedError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            SlatedError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            SlatedError::Conflict(_) => (
                StatusCode::CONFLICT,
                "Conflict",
                self.to_string(),
            ),
            SlatedError::ExternalService(_) => (
                StatusCode::BAD_GATEWAY,
                "UpstreamFailure",
                self.to_string(),
            ),
            SlatedError::Database(_)
            | SlatedError::Internal(_)
            | SlatedError::Io(_)
            | SlatedError::Mail(_)
            | SlatedError::Jwt(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type SlatedResult<T> = Result<T, SlatedError>;
