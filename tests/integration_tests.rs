//! End-to-end tests for the demo server.
//!
//! Each test starts the full router on an ephemeral port and talks to it
//! over HTTP with `reqwest`, so the real connection info, header handling
//! and body streaming are exercised.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use weblayer::{Config, build_router};

/// Test fixture that runs the demo server in the background
struct TestFixture {
    base_url: String,
    client: Client,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_config(Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "warn".to_string(),
            ..Config::default()
        })
        .await
    }

    async fn with_config(config: Config) -> Self {
        let app = build_router(&config).expect("Failed to build router");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to ephemeral port");
        let addr = listener.local_addr().expect("Failed to get local address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn request_id_of(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id header")
        .to_str()
        .unwrap()
        .to_string()
}

// =============================================================================
// Health & request IDs
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.get(fixture.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_generated_request_ids_share_prefix_and_increase() {
    let fixture = TestFixture::new().await;

    let first = fixture.client.get(fixture.url("/health")).send().await.unwrap();
    let second = fixture.client.get(fixture.url("/health")).send().await.unwrap();

    let first = request_id_of(&first);
    let second = request_id_of(&second);

    let (prefix_a, n_a) = first.rsplit_once('-').unwrap();
    let (prefix_b, n_b) = second.rsplit_once('-').unwrap();
    assert_eq!(prefix_a, prefix_b);
    assert_eq!(prefix_a.len(), 10);
    assert!(!prefix_a.contains('+') && !prefix_a.contains('/'));
    assert!(n_b.parse::<u64>().unwrap() > n_a.parse::<u64>().unwrap());
}

#[tokio::test]
async fn test_client_request_id_is_propagated() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .header("x-request-id", "client-supplied-7")
        .send()
        .await
        .unwrap();

    assert_eq!(request_id_of(&response), "client-supplied-7");
}

#[tokio::test]
async fn test_custom_request_id_header() {
    let fixture = TestFixture::with_config(Config {
        request_id_header: "x-correlation-id".to_string(),
        ..Config::default()
    })
    .await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .header("x-correlation-id", "corr-1")
        .send()
        .await
        .unwrap();

    let echoed = response.headers().get("x-correlation-id").unwrap();
    assert_eq!(echoed, "corr-1");
}

// =============================================================================
// Form & JSON parsing
// =============================================================================

#[tokio::test]
async fn test_echo_form_merges_body_and_query() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/echo/form?tag=q"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("name=ann+lee&tag=b")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], json!(["ann lee"]));
    assert_eq!(body["tag"], json!(["b", "q"]));
}

#[tokio::test]
async fn test_malformed_form_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/echo/form"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("a=%zz")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().contains("invalid URL escape"));
}

#[tokio::test]
async fn test_echo_json() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/echo/json"))
        .json(&json!({"a": 1, "b": [true, null]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"a": 1, "b": [true, null]}));
}

#[tokio::test]
async fn test_echo_json_without_body_is_null() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/echo/json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_json_wrong_content_type() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/echo/json"))
        .header("content-type", "text/plain")
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text().await.unwrap(),
        "Invalid content-type 'text/plain', application/json expected\n"
    );
}

#[tokio::test]
async fn test_json_not_an_object() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/echo/json"))
        .header("content-type", "application/json")
        .body("[1, 2]")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().starts_with("Cannot parse JSON"));
}

#[tokio::test]
async fn test_greet() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/greet"))
        .json(&json!({"name": "Ada", "excited": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Hello, Ada!");
}

#[tokio::test]
async fn test_greet_requires_body() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.post(fixture.url("/greet")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Errors & panics
// =============================================================================

#[tokio::test]
async fn test_panic_is_recovered() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.get(fixture.url("/panic")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let id = request_id_of(&response);
    let body = response.text().await.unwrap();
    assert_eq!(body, format!("Internal Error (request ID: {id})\n"));

    // The server keeps serving after a panic.
    let response = fixture.client.get(fixture.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_internal_error_hides_message() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.get(fixture.url("/fail")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let id = request_id_of(&response);
    let body = response.text().await.unwrap();
    assert!(body.contains(&id));
    assert!(!body.contains("deliberate"));
}

#[tokio::test]
async fn test_env_contains_service_info() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.get(fixture.url("/env")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["service"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_route_gets_request_id() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/does-not-exist"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
}
