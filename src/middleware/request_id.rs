//! Request ID middleware for log correlation.
//!
//! # Features
//!
//! - Propagates an existing `X-Request-Id` header
//! - Otherwise generates `<prefix>-<n>`, where the prefix is ten random
//!   base64 characters chosen once per process and `n` is a process-wide
//!   counter starting at 1
//! - Stores the ID as a [`RequestId`] request extension
//! - Makes the ID readable from anywhere inside the request's task through
//!   [`current_request_id`], which the error helpers use
//!
//! # Client Usage
//!
//! ```bash
//! curl -H "X-Request-Id: my-correlation-id" http://localhost:3000/health
//! ```
//!
//! The same ID is logged with every line for that request and, when the
//! response header is propagated (see [`crate::middleware::CommonStack`]),
//! returned to the client.

use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Request, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use tower::{Layer, Service};
use tracing::debug;

/// Default header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Length of the per-process random prefix.
const PREFIX_LEN: usize = 10;

static REQUEST_ID_PREFIX: LazyLock<String> = LazyLock::new(generate_prefix);
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

tokio::task_local! {
    static CURRENT_REQUEST_ID: RequestId;
}

/// Identifier attached to a request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request ID of the request currently being served by this task.
///
/// Returns `None` outside of [`RequestIdLayer`] or in tasks spawned by a
/// handler.
pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID.try_with(Clone::clone).ok()
}

/// Produce the next generated request ID.
pub fn next_request_id() -> RequestId {
    let n = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    RequestId(format!("{}-{n}", request_id_prefix()))
}

/// Random prefix shared by all generated request IDs of this process.
pub fn request_id_prefix() -> &'static str {
    &REQUEST_ID_PREFIX
}

/// Ten base64 characters from 12 random bytes, with `+` and `/` removed.
/// Retries until enough characters survive the filtering.
fn generate_prefix() -> String {
    let mut rng = rand::rng();
    loop {
        let mut buf = [0u8; 12];
        rng.fill(&mut buf);
        let encoded: String = STANDARD
            .encode(buf)
            .chars()
            .filter(|c| *c != '+' && *c != '/')
            .take(PREFIX_LEN)
            .collect();
        if encoded.len() == PREFIX_LEN {
            return encoded;
        }
    }
}

/// Request ID layer for Tower middleware stack.
#[derive(Clone)]
pub struct RequestIdLayer {
    header: HeaderName,
}

impl RequestIdLayer {
    /// Create a request ID layer reading `X-Request-Id`.
    pub fn new() -> Self {
        Self::with_header(HeaderName::from_static(REQUEST_ID_HEADER))
    }

    /// Create a request ID layer reading a custom header.
    pub fn with_header(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for RequestIdLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService {
            inner,
            header: self.header.clone(),
        }
    }
}

/// Request ID service wrapper.
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
    header: HeaderName,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_id = extract_or_generate_request_id(&req, &self.header);

        // Add request ID to request headers (so handlers can access it)
        if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
            req.headers_mut().insert(self.header.clone(), value);
        }
        req.extensions_mut().insert(request_id.clone());

        debug!(request_id = %request_id, "Processing request");

        let mut inner = self.inner.clone();

        Box::pin(CURRENT_REQUEST_ID.scope(request_id, async move { inner.call(req).await }))
    }
}

/// Extract request ID from headers or generate a new one.
fn extract_or_generate_request_id<B>(req: &Request<B>, header: &HeaderName) -> RequestId {
    if let Some(header_value) = req.headers().get(header)
        && let Ok(value) = header_value.to_str()
        && !value.is_empty()
    {
        return RequestId(value.to_string());
    }

    next_request_id()
}

/// Extension trait to extract request ID from requests.
pub trait RequestIdExt {
    /// Get the request ID assigned by [`RequestIdLayer`].
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}
