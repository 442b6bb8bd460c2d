//! Client IP resolution (the "real IP" middleware).
//!
//! Determines the address of the client that originated a request and stores
//! it as a [`ClientIp`] request extension, which the request logger prints.
//!
//! # Resolution Order
//!
//! 1. `X-Forwarded-For` header (first entry of the comma-separated list)
//! 2. `X-Real-IP` header
//! 3. The socket peer address from [`ConnectInfo`], when the server was
//!    started with `into_make_service_with_connect_info::<SocketAddr>()`
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **The header-based steps trust client-provided headers.** Only deploy this
//! behind a reverse proxy that overwrites (not appends to) these headers:
//!
//! ```nginx
//! proxy_set_header X-Real-IP $remote_addr;
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```
//!
//! The value is used for logging only; nothing in this crate makes access
//! decisions based on it.

use std::fmt;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Resolved client address, stored in request extensions by [`real_ip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the client IP was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    FromXff(&'a str),
    FromRealIp(&'a str),
    NotFound,
}

/// Extract the raw IP string from proxy headers without allocating.
#[inline]
fn extract_ip_from_headers<B>(req: &Request<B>) -> ExtractedIp<'_> {
    // Format: "client, proxy1, proxy2" - we want the first (client) IP
    if let Some(forwarded) = req.headers().get(X_FORWARDED_FOR)
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next().map(str::trim)
        && !first_ip.is_empty()
    {
        return ExtractedIp::FromXff(first_ip);
    }

    if let Some(real_ip) = req.headers().get(X_REAL_IP)
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return ExtractedIp::FromRealIp(value.trim());
    }

    ExtractedIp::NotFound
}

/// Resolve the client IP of a request, or `None` if neither proxy headers
/// nor connection info are available.
pub fn extract_client_ip<B>(req: &Request<B>) -> Option<String> {
    match extract_ip_from_headers(req) {
        ExtractedIp::FromXff(ip) | ExtractedIp::FromRealIp(ip) => Some(ip.to_string()),
        ExtractedIp::NotFound => req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}

/// Middleware that stores the resolved [`ClientIp`] in request extensions.
pub async fn real_ip(mut request: Request, next: Next) -> Response {
    if let Some(ip) = extract_client_ip(&request) {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}
