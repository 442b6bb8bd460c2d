//! Access logging middleware.
//!
//! [`log_requests`] emits exactly one event per request, after the inner
//! handler has produced its response. The event message is the request path
//! and it carries these fields:
//!
//! | Field            | Source                                              |
//! |------------------|-----------------------------------------------------|
//! | `req`            | [`RequestId`] extension (if present)                |
//! | `verb`           | request method                                      |
//! | `ip`             | [`ClientIp`] extension (if present)                 |
//! | `time`           | handler duration                                    |
//! | `status`         | response status code                                |
//! | `err`            | [`ErrorDetails`] message (if present)               |
//! | `stack0..stack2` | top stack frames, for 5xx responses with a stack    |
//!
//! # Levels
//!
//! - `ERROR` for 5xx
//! - `WARN` for 4xx
//! - `INFO` otherwise
//!
//! # Example
//!
//! ```text
//! WARN weblayer::middleware::logger: /orders req="k3Jd9aPq1X-42" verb=POST ip=10.0.0.7 time=812µs status=400 err="Invalid content-type 'text/xml', application/json expected"
//! ```

use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{error, info, warn};

use super::ip::{ClientIp, extract_client_ip};
use super::request_id::RequestId;
use crate::responses::ErrorDetails;

/// Number of stack frames logged for server errors.
pub const STACK_LEVELS: usize = 3;

/// Everything logged about one request.
#[derive(Debug, Clone)]
struct AccessRecord {
    path: String,
    verb: Method,
    request_id: Option<RequestId>,
    ip: Option<String>,
    elapsed: Duration,
    status: StatusCode,
    err: Option<String>,
    stack: Vec<String>,
}

macro_rules! access_event {
    ($level:ident, $record:expr) => {{
        let record = $record;
        $level!(
            req = record.request_id.as_ref().map(RequestId::as_str),
            verb = %record.verb,
            ip = record.ip.as_deref(),
            time = ?record.elapsed,
            status = record.status.as_u16(),
            err = record.err.as_deref(),
            stack0 = record.stack.first().map(String::as_str),
            stack1 = record.stack.get(1).map(String::as_str),
            stack2 = record.stack.get(2).map(String::as_str),
            "{}",
            record.path
        )
    }};
}

impl AccessRecord {
    fn emit(&self) {
        if self.status.is_server_error() {
            access_event!(error, self);
        } else if self.status.is_client_error() {
            access_event!(warn, self);
        } else {
            access_event!(info, self);
        }
    }
}

/// Middleware that logs each request once it has been handled.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let verb = request.method().clone();
    let request_id = request.extensions().get::<RequestId>().cloned();
    let ip = request
        .extensions()
        .get::<ClientIp>()
        .map(|ip| ip.as_str().to_string())
        .or_else(|| extract_client_ip(&request));

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status();
    let details = response.extensions().get::<ErrorDetails>();
    let stack = match details.and_then(|d| d.stack.as_ref()) {
        Some(stack) if status.is_server_error() => stack.summary(STACK_LEVELS),
        _ => Vec::new(),
    };

    AccessRecord {
        path,
        verb,
        request_id,
        ip,
        elapsed,
        status,
        err: details.map(|d| d.message.clone()),
        stack,
    }
    .emit();

    response
}
