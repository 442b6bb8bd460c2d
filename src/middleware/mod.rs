//! HTTP middleware for request correlation, logging, recovery and body parsing.
//!
//! This module provides the middleware components:
//!
//! - **Request ID**: propagated from `X-Request-Id` or generated as `<prefix>-<n>`
//! - **Client IP**: resolved from proxy headers or the socket peer
//! - **Request Span**: tracing span tagging every event with the request ID
//! - **Access Log**: one structured event per request, levelled by status
//! - **Parameter Log**: debug-level dump of request parameters on entry
//! - **Recover**: panics become 500 responses with a logged stack summary
//! - **Form / JSON**: request bodies decoded into request extensions
//! - **Env**: fixed per-request values for handlers
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Client IP → Span → Access Log → Recover → Form → Handler
//!               ↓            ↓         ↓         ↓           ↓        ↓
//!          X-Request-Id   ClientIp   req=…   1 event/req   500     FormParams
//! ```
//!
//! [`add_common`] and [`add_common_logged`] install these in the order shown.

pub mod common;
pub mod context;
pub mod env;
pub mod form;
pub mod ip;
pub mod json;
pub mod logger;
pub mod params;
pub mod recover;
pub mod request_id;

pub use common::{CommonStack, add_common, add_common_logged};
pub use context::{RequestSpan, context_span};
pub use env::{EnvAddLayer, RequestEnv, env_add};
pub use form::{FormError, FormParams, parse_form};
pub use ip::{ClientIp, extract_client_ip, real_ip};
pub use json::{JsonBody, parse_json};
pub use logger::log_requests;
pub use params::{ParamsLogConfig, log_params};
pub use recover::RecoverLayer;
pub use request_id::{
    REQUEST_ID_HEADER, RequestId, RequestIdExt, RequestIdLayer, current_request_id,
};
