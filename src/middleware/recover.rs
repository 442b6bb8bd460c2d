//! Panic recovery middleware.
//!
//! [`RecoverLayer`] turns a panicking handler into a `500 Internal Server
//! Error` response instead of tearing down the connection. The panic message
//! becomes the error text (`panic: <message>`) and the stack recorded at the
//! panic site is attached to the response for the request logger, which
//! prints its top frames.
//!
//! Stack recording needs [`crate::stack::install_panic_hook`]; the layer
//! installs it on construction. Without a recorded stack the panic is still
//! recovered and logged, just without frames.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures::FutureExt;
use tower::{Layer, Service};

use crate::responses::error_with_stack;
use crate::stack::{install_panic_hook, take_panic_stack};

/// Panic-catching layer.
#[derive(Clone)]
pub struct RecoverLayer;

impl RecoverLayer {
    pub fn new() -> Self {
        install_panic_hook();
        Self
    }
}

impl Default for RecoverLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RecoverLayer {
    type Service = RecoverService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoverService { inner }
    }
}

/// Panic-catching service wrapper.
#[derive(Clone)]
pub struct RecoverService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RecoverService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // `call` runs inside the guarded future so panics raised before
            // the handler's first await are caught too.
            match AssertUnwindSafe(async move { inner.call(req).await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => {
                    let stack = take_panic_stack();
                    Ok(error_with_stack(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("panic: {}", panic_message(payload.as_ref())),
                        stack,
                    ))
                }
            }
        })
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "Box<dyn Any>"
    }
}
