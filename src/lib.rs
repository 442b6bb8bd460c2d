//! # weblayer
//!
//! Cross-cutting HTTP middleware for Axum services:
//!
//! - **Request IDs**: propagated from `X-Request-Id` or generated as `<prefix>-<n>`
//! - **Access logging**: one structured `tracing` event per request
//! - **Panic recovery**: handler panics become 500 responses with a logged stack summary
//! - **Body parsing**: URL-encoded forms and JSON objects into request extensions
//! - **Error responses**: uniform plain-text errors that hide 5xx details from clients
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Client IP → Span → Log → Recover) │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Body parsing (form, JSON)                                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers, using responses::* and AppError                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::Router;
//! use axum::routing::get;
//! use weblayer::middleware::add_common_logged;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     tracing_subscriber::fmt().init();
//!
//!     let app = add_common_logged(Router::new().route("/", get(|| async { "hello" })));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod responses;
pub mod routes;
pub mod shutdown;
pub mod stack;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use middleware::{add_common, add_common_logged};
pub use routes::build_router;
