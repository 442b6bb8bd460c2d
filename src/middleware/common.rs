//! Ready-made middleware stacks.
//!
//! ```text
//! add_common:         RequestId → propagate X-Request-Id → real_ip
//! add_common_logged:  add_common → context_span → log_requests → Recover → parse_form
//! ```
//!
//! Layers are listed outermost first. Layers the caller adds to the router
//! afterwards wrap the whole stack.

use axum::Router;
use axum::http::HeaderName;
use axum::middleware::from_fn;
use tower_http::propagate_header::PropagateHeaderLayer;

use super::context::context_span;
use super::form::parse_form;
use super::ip::real_ip;
use super::logger::log_requests;
use super::recover::RecoverLayer;
use super::request_id::RequestIdLayer;

/// Configurable version of [`add_common`] / [`add_common_logged`].
#[derive(Clone, Default)]
pub struct CommonStack {
    request_id: RequestIdLayer,
}

impl CommonStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and echo request IDs using `header` instead of `X-Request-Id`.
    pub fn request_id_header(mut self, header: HeaderName) -> Self {
        self.request_id = RequestIdLayer::with_header(header);
        self
    }

    /// Request ID, response header propagation and client IP resolution.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        // Applied innermost first
        router
            .layer(from_fn(real_ip))
            .layer(PropagateHeaderLayer::new(self.request_id.header().clone()))
            .layer(self.request_id.clone())
    }

    /// [`CommonStack::apply`] plus the request span, access logging, panic
    /// recovery and form parsing.
    pub fn apply_logged<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = router
            .layer(from_fn(parse_form))
            .layer(RecoverLayer::new())
            .layer(from_fn(log_requests))
            .layer(from_fn(context_span));
        self.apply(router)
    }
}

/// Add request ID tagging and client IP resolution to `router`.
pub fn add_common<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    CommonStack::new().apply(router)
}

/// Add the full middleware stack to `router`.
pub fn add_common_logged<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    CommonStack::new().apply_logged(router)
}
