//! Response writers and error-response formatting.
//!
//! Every error helper does two things: it writes a `text/plain` response for
//! the client, and it attaches [`ErrorDetails`] to the response extensions so
//! the request logger can report the error message (and, for internal
//! errors, the stack) next to the status code.
//!
//! For status codes of 500 and above the client only sees a generic message
//! carrying the request ID; the actual error text stays in the logs.

use std::error::Error as StdError;
use std::fmt;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use crate::middleware::request_id::current_request_id;
use crate::stack::StackTrace;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON_UTF8: &str = "application/json; charset=utf-8";

/// Error information recorded on a response for the request logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    /// Full error message (never truncated or sanitised).
    pub message: String,
    /// Stack at the point the error was raised, for internal errors.
    pub stack: Option<StackTrace>,
}

/// Write a `text/plain` response.
pub fn write_string(code: StatusCode, body: impl Into<String>) -> Response {
    (
        code,
        [(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8))],
        body.into(),
    )
        .into_response()
}

/// Write a formatted `text/plain` response.
///
/// ```rust,ignore
/// write_fmt(StatusCode::OK, format_args!("{} items", count))
/// ```
pub fn write_fmt(code: StatusCode, args: fmt::Arguments<'_>) -> Response {
    write_string(code, args.to_string())
}

/// Write a JSON response.
///
/// The value is rendered into a buffer before anything is sent, so a
/// serialisation failure still produces a proper 500 response.
pub fn write_json<T: Serialize + ?Sized>(code: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(buf) => {
            let mut response = Response::new(Body::from(buf));
            *response.status_mut() = code;
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static(APPLICATION_JSON_UTF8),
            );
            response
        }
        Err(e) => {
            warn!(error = %e, "JSON serialisation failed, responding with internal error");
            error_internal(Some(&e))
        }
    }
}

/// Produce an error response and record the error for the logger.
///
/// For 5xx codes the client receives `Internal Error (request ID: <id>)`
/// and `message` is only logged.
pub fn error_string(code: StatusCode, message: impl Into<String>) -> Response {
    error_with_stack(code, message, None)
}

/// [`error_string`] with a format string.
pub fn errorf(code: StatusCode, args: fmt::Arguments<'_>) -> Response {
    error_string(code, args.to_string())
}

/// Produce a 500 response for `err`, capturing the current stack.
pub fn error_internal(err: Option<&dyn StdError>) -> Response {
    let message = match err {
        Some(e) => e.to_string(),
        None => "no error passed to error_internal".to_string(),
    };
    error_with_stack(
        StatusCode::INTERNAL_SERVER_ERROR,
        message,
        Some(StackTrace::capture()),
    )
}

/// Shared implementation of the error helpers.
pub(crate) fn error_with_stack(
    code: StatusCode,
    message: impl Into<String>,
    stack: Option<StackTrace>,
) -> Response {
    let message = message.into();

    let body = if code.is_server_error() {
        let request_id = current_request_id();
        format!(
            "Internal Error (request ID: {})\n",
            request_id.as_ref().map(|id| id.as_str()).unwrap_or_default()
        )
    } else {
        format!("{message}\n")
    };

    let mut response = write_string(code, body);
    response
        .headers_mut()
        .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
        .extensions_mut()
        .insert(ErrorDetails { message, stack });
    response
}
