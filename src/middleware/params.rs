//! Request parameter logging for debugging.
//!
//! Unlike the access logger, which logs once the response is ready,
//! [`log_params`] logs at `DEBUG` when the request *enters* the handler
//! chain. Install it with `from_fn_with_state`:
//!
//! ```rust,ignore
//! router.layer(from_fn_with_state(ParamsLogConfig { verbose: true }, log_params))
//! ```
//!
//! The parameters are the [`FormParams`] parsed by
//! [`crate::middleware::parse_form`] if it ran earlier in the chain, or the
//! decoded query string otherwise. Verbose mode adds the matched route, the
//! path parameter values (`url_params`) and the request's [`RequestEnv`].

use axum::RequestExt;
use axum::extract::{MatchedPath, RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::env::RequestEnv;
use super::form::FormParams;

/// Options for [`log_params`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamsLogConfig {
    pub verbose: bool,
}

/// Render params as `k=v k2=v2`.
fn render_params(params: &FormParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render path parameters as `id=42 name=x`.
fn render_path_params(params: &RawPathParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn request_params(request: &Request) -> FormParams {
    if let Some(params) = request.extensions().get::<FormParams>() {
        return params.clone();
    }
    // Unparseable queries are rejected by parse_form; here they are just
    // not logged.
    FormParams::parse(request.uri().query().unwrap_or_default()).unwrap_or_default()
}

pub async fn log_params(
    State(config): State<ParamsLogConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let url_params = if config.verbose {
        request
            .extract_parts::<RawPathParams>()
            .await
            .ok()
            .map(|params| render_path_params(&params))
    } else {
        None
    };
    let params = render_params(&request_params(&request));
    let method = request.method();
    let path = request.uri().path();

    if config.verbose {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);
        let url_params = url_params.as_deref();
        let env = request
            .extensions()
            .get::<RequestEnv>()
            .map(|env| serde_json::to_string(env).unwrap_or_default());
        debug!(params = %params, route, url_params, env, "Begin {method} {path}");
    } else {
        debug!(params = %params, "Begin {method} {path}");
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_render_params() {
        let params = FormParams::parse("a=1&b=two+words").unwrap();
        assert_eq!(render_params(&params), "a=1 b=two words");
    }

    #[test]
    fn test_request_params_prefers_parsed_form() {
        let mut request = Request::builder()
            .uri("/?q=query")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(FormParams::parse("f=form").unwrap());

        assert_eq!(request_params(&request).get("f"), Some("form"));
        assert_eq!(request_params(&request).get("q"), None);
    }

    #[test]
    fn test_request_params_falls_back_to_query() {
        let request = Request::builder()
            .uri("/?q=query&bad=%zz")
            .body(Body::empty())
            .unwrap();

        assert!(request_params(&request).is_empty());

        let request = Request::builder()
            .uri("/?q=query")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_params(&request).get("q"), Some("query"));
    }
}
