//! Demo endpoints exercising the middleware stack.
//!
//! # Endpoints
//!
//! - `POST /echo/form` - parsed form and query parameters as JSON
//! - `POST /echo/json` - parsed JSON body (`null` without a body)
//! - `POST /greet` - typed JSON body, plain-text reply
//! - `GET /env` - the request's `RequestEnv`
//! - `GET /panic` - panics; recovered into a 500
//! - `GET /fail` - returns an internal error; the message only reaches the logs

use axum::Extension;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::middleware::{FormParams, JsonBody, RequestEnv};
use crate::responses::{write_fmt, write_json};

/// Body accepted by [`greet`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GreetRequest {
    pub name: String,
    #[serde(default)]
    pub excited: bool,
}

#[instrument(skip_all)]
pub async fn echo_form(params: FormParams) -> Response {
    info!(count = params.len(), "Echoing form parameters");
    write_json(StatusCode::OK, &params)
}

#[instrument(skip_all)]
pub async fn echo_json(body: JsonBody) -> Response {
    write_json(StatusCode::OK, &body.0)
}

#[instrument(skip_all)]
pub async fn greet(body: JsonBody) -> AppResult<Response> {
    if body.is_empty() {
        return Err(AppError::BadRequest("a JSON body is required".to_string()));
    }
    let request: GreetRequest = body.deserialize()?;
    let punctuation = if request.excited { "!" } else { "." };

    Ok(write_fmt(
        StatusCode::OK,
        format_args!("Hello, {}{punctuation}", request.name),
    ))
}

pub async fn echo_env(env: Option<Extension<RequestEnv>>) -> Response {
    let env = env.map(|Extension(env)| env).unwrap_or_default();
    write_json(StatusCode::OK, &env)
}

pub async fn trigger_panic() -> &'static str {
    panic!("deliberate panic from /panic")
}

pub async fn fail() -> AppResult<&'static str> {
    Err(AppError::Internal("deliberate failure from /fail".to_string()))
}
