//! URL-encoded form parsing middleware.
//!
//! [`parse_form`] decodes the query string and, for `POST`, `PUT` and
//! `PATCH` requests sent as `application/x-www-form-urlencoded`, the request
//! body. The result is stored as a [`FormParams`] request extension; body
//! values come before query values. The body is handed on unchanged, so
//! handlers can still read it.
//!
//! Decoding is strict: a malformed `%` escape, a `;` separator or invalid
//! UTF-8 rejects the request with `400 Bad Request`, on the assumption that
//! such errors are the client's.

use std::borrow::Cow;
use std::collections::BTreeMap;

use axum::body::{Body, to_bytes};
use axum::extract::{FromRequestParts, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::error::AppError;
use crate::responses::error_string;

/// Maximum form body size read by [`parse_form`] (10 MiB).
pub const MAX_FORM_BODY_SIZE: usize = 10 << 20;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Form decoding failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    #[error("invalid semicolon separator in query")]
    Semicolon,

    #[error("invalid UTF-8 in form data")]
    InvalidUtf8,

    #[error("failed to read form body: {0}")]
    Body(String),
}

/// Decoded form and query parameters in request order.
///
/// A key may appear more than once; [`FormParams::get`] returns the first
/// value, matching how most handlers treat repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams {
    pairs: Vec<(String, String)>,
}

impl FormParams {
    /// Decode an `application/x-www-form-urlencoded` string.
    pub fn parse(encoded: &str) -> Result<Self, FormError> {
        let mut params = Self::default();
        params.extend_from_encoded(encoded)?;
        Ok(params)
    }

    /// Decode `encoded` and append its pairs.
    ///
    /// On error nothing is appended.
    pub fn extend_from_encoded(&mut self, encoded: &str) -> Result<(), FormError> {
        let mut decoded = Vec::new();
        for segment in encoded.split('&').filter(|s| !s.is_empty()) {
            if segment.contains(';') {
                return Err(FormError::Semicolon);
            }
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            decoded.push((decode_component(key)?, decode_component(value)?));
        }
        self.pairs.extend(decoded);
        Ok(())
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in order.
    pub fn get_all<'a, 'k>(&'a self, key: &'k str) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Serialises as `{"key": ["value", ...]}`.
impl Serialize for FormParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (key, value) in self.iter() {
            grouped.entry(key).or_default().push(value);
        }
        grouped.serialize(serializer)
    }
}

/// Use the params parsed by [`parse_form`], or decode the query string when
/// the middleware is not installed.
impl<S> FromRequestParts<S> for FormParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(params) = parts.extensions.get::<FormParams>() {
            return Ok(params.clone());
        }
        Ok(FormParams::parse(parts.uri.query().unwrap_or_default())?)
    }
}

/// Decode one key or value: `+` is a space, `%XX` a byte.
fn decode_component(raw: &str) -> Result<String, FormError> {
    let bytes = raw.as_bytes();
    for (i, _) in raw.match_indices('%') {
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            let escape: String = raw.get(i..).unwrap_or_default().chars().take(3).collect();
            return Err(FormError::InvalidEscape(escape));
        }
    }

    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|_| FormError::InvalidUtf8)
}

fn is_form_body(method: &Method, headers: &HeaderMap) -> bool {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

fn reject(error: FormError) -> Response {
    debug!(error = %error, "Rejecting request with malformed form data");
    error_string(StatusCode::BAD_REQUEST, error.to_string())
}

/// Middleware that stores decoded [`FormParams`] in request extensions.
pub async fn parse_form(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let mut params = FormParams::default();

    let body = if is_form_body(&parts.method, &parts.headers) {
        let bytes = match to_bytes(body, MAX_FORM_BODY_SIZE).await {
            Ok(bytes) => bytes,
            Err(e) => return reject(FormError::Body(e.to_string())),
        };
        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text,
            Err(_) => return reject(FormError::InvalidUtf8),
        };
        if let Err(e) = params.extend_from_encoded(text) {
            return reject(e);
        }
        Body::from(bytes)
    } else {
        body
    };

    if let Some(query) = parts.uri.query()
        && let Err(e) = params.extend_from_encoded(query)
    {
        return reject(e);
    }

    parts.extensions.insert(params);
    next.run(Request::from_parts(parts, body)).await
}
