//! JSON request body middleware.
//!
//! [`parse_json`] reads an `application/json` body and stores it as a
//! [`JsonBody`] request extension holding a JSON object, which handlers can
//! inspect directly or convert into a typed struct with
//! [`JsonBody::deserialize`].
//!
//! The middleware is permissive about framing: a missing `Content-Length`
//! or `Content-Type` is fine as long as there is either no body at all or a
//! body that parses as JSON.
//!
//! # Rejections (`400 Bad Request`)
//!
//! | Condition                                   | Message                                             |
//! |---------------------------------------------|-----------------------------------------------------|
//! | `Content-Length` not an integer             | `Invalid content-length: <err>`                     |
//! | `Content-Type` not exactly `application/json` | `Invalid content-type '<ct>', application/json expected` |
//! | empty body but `Content-Length` > 0         | `Premature EOF reading post body`                   |
//! | body is not a JSON object                   | `Cannot parse JSON request body: <err>`             |

use axum::body::{Body, to_bytes};
use axum::extract::{FromRequestParts, Request};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AppError;
use crate::responses::{APPLICATION_JSON, error_string};

/// Maximum JSON body size read by [`parse_json`] (10 MiB).
pub const MAX_JSON_BODY_SIZE: usize = 10 << 20;

/// Parsed JSON request body; `None` when the request had no body (or `null`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonBody(pub Option<Map<String, Value>>);

impl JsonBody {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_ref().and_then(|map| map.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn into_inner(self) -> Option<Map<String, Value>> {
        self.0
    }

    /// Convert the body into a typed value. An absent body deserialises
    /// from JSON `null`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.0 {
            Some(map) => serde_json::from_value(Value::Object(map.clone())),
            None => serde_json::from_value(Value::Null),
        }
    }
}

impl<S> FromRequestParts<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<JsonBody>().cloned().ok_or_else(|| {
            AppError::Internal("JsonBody requested but parse_json is not installed".to_string())
        })
    }
}

fn reject(message: String) -> Response {
    debug!(error = %message, "Rejecting JSON request");
    error_string(StatusCode::BAD_REQUEST, message)
}

/// Parse the `Content-Length` header, defaulting to zero when absent.
///
/// Any integer is accepted here, including negative ones; a declared length
/// other than zero with an empty body is reported as a premature EOF.
fn content_length(headers: &HeaderMap) -> Result<i64, String> {
    match headers.get(CONTENT_LENGTH) {
        None => Ok(0),
        Some(value) => value
            .to_str()
            .map_err(|e| e.to_string())
            .and_then(|s| s.parse::<i64>().map_err(|e| e.to_string()))
            .map_err(|e| format!("Invalid content-length: {e}")),
    }
}

/// Check that `Content-Type`, when present and non-empty, is exactly
/// `application/json`. Parameters such as `charset` are rejected.
fn check_content_type(headers: &HeaderMap) -> Result<(), String> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(());
    };
    let content_type = String::from_utf8_lossy(value.as_bytes());
    if content_type.is_empty() || content_type == APPLICATION_JSON {
        return Ok(());
    }
    Err(format!(
        "Invalid content-type '{content_type}', application/json expected"
    ))
}

/// Decode the first JSON value of `bytes`; anything after it is ignored.
///
/// Returns `Ok(None)` for an empty or whitespace-only body so the caller can
/// decide whether that is acceptable.
fn decode_body(bytes: &[u8]) -> Result<Option<JsonBody>, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let mut values = serde_json::Deserializer::from_slice(bytes)
        .into_iter::<Option<Map<String, Value>>>();
    match values.next() {
        Some(value) => value.map(|map| Some(JsonBody(map))),
        None => Ok(None),
    }
}

/// Middleware that stores the parsed [`JsonBody`] in request extensions.
pub async fn parse_json(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let declared_length = match content_length(&parts.headers) {
        Ok(length) => length,
        Err(message) => return reject(message),
    };
    if let Err(message) = check_content_type(&parts.headers) {
        return reject(message);
    }

    let bytes = match to_bytes(body, MAX_JSON_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(e) => return reject(format!("Cannot read JSON request body: {e}")),
    };

    let json = match decode_body(&bytes) {
        Ok(Some(json)) => json,
        Ok(None) if declared_length != 0 => {
            return reject("Premature EOF reading post body".to_string());
        }
        Ok(None) => JsonBody(None),
        Err(e) => return reject(format!("Cannot parse JSON request body: {e}")),
    };

    parts.extensions.insert(json);
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::Method;
    use axum::routing::post;
    use serde::Deserialize;
    use serde_json::json;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Greeting {
        name: String,
    }

    #[test]
    fn test_decode_object() {
        let body = decode_body(br#"{"name":"ada"}"#).unwrap().unwrap();

        assert_eq!(body.get("name"), Some(&json!("ada")));
        assert_eq!(
            body.deserialize::<Greeting>().unwrap(),
            Greeting {
                name: "ada".to_string()
            }
        );
    }

    #[test]
    fn test_decode_ignores_trailing_data() {
        let body = decode_body(br#"{"a":1} trailing"#).unwrap().unwrap();
        assert_eq!(body.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_decode_null_and_blank() {
        assert_eq!(decode_body(b"null").unwrap(), Some(JsonBody(None)));
        assert_eq!(decode_body(b"  \n").unwrap(), None);
        assert_eq!(decode_body(b"").unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(decode_body(b"[1,2]").is_err());
        assert!(decode_body(b"{\"a\":").is_err());
    }

    #[test]
    fn test_content_type_checks() {
        let mut headers = HeaderMap::new();
        assert!(check_content_type(&headers).is_ok());

        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(check_content_type(&headers).is_ok());

        headers.insert(CONTENT_TYPE, "text/xml".parse().unwrap());
        assert_eq!(
            check_content_type(&headers).unwrap_err(),
            "Invalid content-type 'text/xml', application/json expected"
        );
    }

    #[test]
    fn test_content_type_must_match_exactly() {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(check_content_type(&headers).is_err());

        headers.insert(CONTENT_TYPE, "Application/JSON; charset=latin1".parse().unwrap());
        assert_eq!(
            check_content_type(&headers).unwrap_err(),
            "Invalid content-type 'Application/JSON; charset=latin1', application/json expected"
        );

        headers.insert(CONTENT_TYPE, "APPLICATION/JSON".parse().unwrap());
        assert!(check_content_type(&headers).is_err());
    }

    #[test]
    fn test_content_length_checks() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), Ok(0));

        headers.insert(CONTENT_LENGTH, "12".parse().unwrap());
        assert_eq!(content_length(&headers), Ok(12));

        headers.insert(CONTENT_LENGTH, "-1".parse().unwrap());
        assert_eq!(content_length(&headers), Ok(-1));

        headers.insert(CONTENT_LENGTH, "twelve".parse().unwrap());
        assert!(
            content_length(&headers)
                .unwrap_err()
                .starts_with("Invalid content-length: ")
        );
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                post(|body: JsonBody| async move { serde_json::to_string(&body.0).unwrap() }),
            )
            .layer(axum::middleware::from_fn(parse_json))
    }

    async fn send(request: Request) -> (StatusCode, String) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn post_request() -> axum::http::request::Builder {
        Request::builder().method(Method::POST).uri("/")
    }

    #[tokio::test]
    async fn test_absent_body_is_tolerated() {
        let request = post_request().body(Body::empty()).unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "null");
    }

    #[tokio::test]
    async fn test_object_body_is_parsed() {
        let request = post_request()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"n":1}"#))
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"n":1}"#);
    }

    #[tokio::test]
    async fn test_premature_eof() {
        let request = post_request()
            .header(CONTENT_LENGTH, "5")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Premature EOF reading post body\n");
    }

    #[tokio::test]
    async fn test_negative_length_without_body_is_premature_eof() {
        let request = post_request()
            .header(CONTENT_LENGTH, "-1")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Premature EOF reading post body\n");
    }

    #[tokio::test]
    async fn test_content_type_with_parameters_rejected() {
        let request = post_request()
            .header(CONTENT_TYPE, "Application/JSON; charset=latin1")
            .body(Body::from(r#"{"a":1}"#))
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            "Invalid content-type 'Application/JSON; charset=latin1', application/json expected\n"
        );
    }

    #[tokio::test]
    async fn test_wrong_content_type() {
        let request = post_request()
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            "Invalid content-type 'text/plain', application/json expected\n"
        );
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let request = post_request().body(Body::from("{oops")).unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with("Cannot parse JSON request body: "));
    }
}
