use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::middleware::form::FormError;
use crate::responses::{error_internal, error_string};

/// Application-wide error types with appropriate HTTP status codes.
///
/// Converting an `AppError` into a response goes through the
/// [`crate::responses`] helpers, so handler errors carry the same body format
/// and [`crate::responses::ErrorDetails`] as errors raised by middleware.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::BadRequest(msg) => error_string(StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotFound(msg) => error_string(StatusCode::NOT_FOUND, msg.as_str()),
            AppError::Form(e) => error_string(StatusCode::BAD_REQUEST, e.to_string()),
            // Serde errors can be helpful for clients debugging their payload
            // but sanitize to avoid leaking internal type names
            AppError::SerializationError(e) => {
                error_string(StatusCode::BAD_REQUEST, sanitize_serde_error(e))
            }
            // Internal errors - the message is logged, the client only sees
            // the request ID
            AppError::Internal(_) | AppError::ConfigError(_) => error_internal(Some(&self)),
        }
    }
}

/// Sanitize serde error messages to avoid leaking internal type information.
///
/// Serde errors can contain internal struct/field names which shouldn't be
/// exposed to external clients. This function extracts the useful parts.
pub fn sanitize_serde_error(e: &serde_json::Error) -> String {
    let msg = e.to_string();

    if msg.contains("missing field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Missing required field: {field}");
    }

    if msg.contains("unknown field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Unknown field: {field}");
    }

    if msg.contains("invalid type") {
        return "Invalid data type in request body".to_string();
    }

    if msg.contains("EOF while parsing") || msg.contains("expected") {
        return "Malformed JSON in request body".to_string();
    }

    "Invalid request format".to_string()
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
