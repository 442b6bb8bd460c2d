//! Demo router with the full middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header, task-local ID
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Client IP      │ ← X-Forwarded-For / X-Real-IP / peer address
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Request Span    │ ← span `request{req=…}`
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Access Log     │ ← one event per request
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Recover       │ ← panic → 500
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Form Parser    │ ← 400 on malformed form data
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │       Env        │ ← service name and version
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Params Log     │ ← optional, per config
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ CORS, Body Limit │
//! └────────┬─────────┘
//!          ▼
//!      Handler (JSON routes add parse_json)
//! ```

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::handlers;
use crate::middleware::{CommonStack, ParamsLogConfig, RequestEnv, env_add, log_params, parse_json};

/// Build the demo router with all routes and middleware configured.
///
/// # Errors
///
/// Returns `AppError::ConfigError` if the configured request ID header is
/// not a valid header name.
pub fn build_router(config: &Config) -> AppResult<Router> {
    let json_routes = Router::new()
        .route("/echo/json", post(handlers::echo_json))
        .route("/greet", post(handlers::greet))
        .route_layer(from_fn(parse_json));

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/echo/form", post(handlers::echo_form))
        .route("/env", get(handlers::echo_env))
        .route("/panic", get(handlers::trigger_panic))
        .route("/fail", get(handlers::fail))
        .merge(json_routes);

    // Innermost layers first; the common stack wraps everything below.
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));
    router = router.layer(build_cors_layer(&config.cors_allowed_origins));

    // Inside env_add so the verbose log sees the request env.
    if config.log_params {
        info!(verbose = config.log_params_verbose, "Parameter logging enabled");
        router = router.layer(from_fn_with_state(
            ParamsLogConfig {
                verbose: config.log_params_verbose,
            },
            log_params,
        ));
    }

    router = router.layer(env_add(
        RequestEnv::new()
            .with("service", env!("CARGO_PKG_NAME"))
            .with("version", env!("CARGO_PKG_VERSION")),
    ));

    let stack = CommonStack::new().request_id_header(config.request_id_header_name()?);
    Ok(stack.apply_logged(router))
}

/// Build CORS layer from configuration.
///
/// # Arguments
///
/// * `allowed_origins` - List of allowed origins, or `["*"]` for any origin
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
