//! Request-scoped tracing span.
//!
//! [`context_span`] opens an `INFO` span named `request` carrying the
//! request ID (`req` field) and runs the rest of the chain inside it, so every
//! event a handler emits is tagged with the ID without passing it around.
//! The span is also stored as a [`RequestSpan`] extension for handlers that
//! spawn work and want to carry it along.
//!
//! Requires [`crate::middleware::RequestIdLayer`] further out in the stack;
//! without a request ID the middleware does nothing.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, Span, info_span};

use super::request_id::RequestId;

/// Span opened by [`context_span`] for the current request.
#[derive(Debug, Clone)]
pub struct RequestSpan(pub Span);

pub async fn context_span(mut request: Request, next: Next) -> Response {
    let Some(request_id) = request.extensions().get::<RequestId>().cloned() else {
        return next.run(request).await;
    };

    let span = info_span!("request", req = %request_id);
    request.extensions_mut().insert(RequestSpan(span.clone()));

    next.run(request).instrument(span).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::middleware::RequestIdLayer;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    async fn has_span(span: Option<axum::Extension<RequestSpan>>) -> &'static str {
        if span.is_some() { "span" } else { "none" }
    }

    #[tokio::test]
    async fn test_span_requires_request_id() {
        let app = Router::new()
            .route("/", get(has_span))
            .layer(axum::middleware::from_fn(context_span));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"none");
    }

    #[tokio::test]
    async fn test_span_attached_with_request_id() {
        let app = Router::new()
            .route("/", get(has_span))
            .layer(axum::middleware::from_fn(context_span))
            .layer(RequestIdLayer::new());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"span");
    }
}
