//! Static per-request values.
//!
//! [`env_add`] builds a middleware that merges a fixed set of key/value pairs
//! into every request's [`RequestEnv`] extension. Handlers read it with
//! `Extension<RequestEnv>`; the verbose parameter logger prints it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::Request;
use serde::Serialize;
use serde_json::Value;
use tower::{Layer, Service};

/// String-keyed values attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestEnv(BTreeMap<String, Value>);

impl RequestEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy all entries of `other` into `self`, overwriting existing keys.
    pub fn merge(&mut self, other: &RequestEnv) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RequestEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Layer that adds a fixed set of values to each request's [`RequestEnv`].
#[derive(Clone)]
pub struct EnvAddLayer {
    values: Arc<RequestEnv>,
}

/// Create an [`EnvAddLayer`].
///
/// ```rust,ignore
/// let router = Router::new()
///     .route("/", get(handler))
///     .layer(env_add(RequestEnv::new().with("tenant", "acme")));
/// ```
pub fn env_add(values: RequestEnv) -> EnvAddLayer {
    EnvAddLayer {
        values: Arc::new(values),
    }
}

impl<S> Layer<S> for EnvAddLayer {
    type Service = EnvAddService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EnvAddService {
            inner,
            values: self.values.clone(),
        }
    }
}

/// Service wrapper for [`EnvAddLayer`].
#[derive(Clone)]
pub struct EnvAddService<S> {
    inner: S,
    values: Arc<RequestEnv>,
}

impl<S, B> Service<Request<B>> for EnvAddService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let extensions = req.extensions_mut();
        match extensions.get_mut::<RequestEnv>() {
            Some(env) => env.merge(&self.values),
            None => {
                extensions.insert(RequestEnv::clone(&self.values));
            }
        }

        self.inner.call(req)
    }
}
