mod common;

use common::{Reply, TestServer};
use inventoryst::http::{authorization, ApiClient, ApiError, RetryPolicy, USER_AGENT};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use std::time::Duration;

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
        max_delay: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_get_json_sends_headers_and_counts_calls() {
    let server = TestServer::start(vec![(
        "GET /items",
        vec![Reply::json(json!({"items": [1, 2, 3]}))],
    )])
    .await;
    let client = ApiClient::new(authorization("Token", "s3cret").unwrap()).unwrap();

    let body: Value = client
        .get_json(&format!("{}/items", server.base_url))
        .await
        .expect("request should succeed");
    assert_eq!(body["items"], json!([1, 2, 3]));
    assert_eq!(client.call_count(), 1);

    let recorded = server.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].headers["user-agent"], USER_AGENT);
    assert_eq!(recorded[0].headers["authorization"], "Token s3cret");
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = TestServer::start(vec![(
        "GET /limited",
        vec![
            Reply::status(429, "slow down").with_header("Retry-After", "0"),
            Reply::json(json!({"ok": true})),
        ],
    )])
    .await;
    let client = ApiClient::new(HeaderMap::new()).unwrap().with_retry(fast_retry(3));

    let body: Value = client
        .get_json(&format!("{}/limited", server.base_url))
        .await
        .expect("second attempt should succeed");

    assert_eq!(body["ok"], json!(true));
    assert_eq!(client.call_count(), 2, "both attempts count as API calls");
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_max_attempts() {
    let server = TestServer::start(vec![(
        "GET /limited",
        vec![Reply::status(429, "slow down")],
    )])
    .await;
    let client = ApiClient::new(HeaderMap::new()).unwrap().with_retry(fast_retry(2));

    let err = client
        .get_json::<Value>(&format!("{}/limited", server.base_url))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::RateLimited { attempts: 2, .. }), "{err:?}");
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_error_status_is_reported_with_body() {
    let server = TestServer::start(vec![(
        "GET /broken",
        vec![Reply::status(500, "internal failure")],
    )])
    .await;
    let client = ApiClient::new(HeaderMap::new()).unwrap();

    let err = client
        .get_json::<Value>(&format!("{}/broken", server.base_url))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("internal failure"));
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_unexpected_body_is_a_decode_error() {
    let server = TestServer::start(vec![("GET /text", vec![Reply::status(200, "<html>")])]).await;
    let client = ApiClient::new(HeaderMap::new()).unwrap();

    let err = client
        .get_json::<Value>(&format!("{}/text", server.base_url))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode { .. }), "{err:?}");
}

#[tokio::test]
async fn test_post_json_sends_body() {
    let server = TestServer::start(vec![(
        "POST /auth/token",
        vec![Reply::json(json!({"access_token": "abc"}))],
    )])
    .await;
    let client = ApiClient::new(HeaderMap::new()).unwrap();

    let body: Value = client
        .post_json(
            &format!("{}/auth/token", server.base_url),
            &json!({"identifier": "acme", "secret": "x"}),
        )
        .await
        .unwrap();

    assert_eq!(body["access_token"], "abc");
    let sent: Value = serde_json::from_str(&server.recorded()[0].body).unwrap();
    assert_eq!(sent["identifier"], "acme");
}
