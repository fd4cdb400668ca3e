//! Connection check and HTTP status mapping

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notesync_core::ports::{IRemoteStore, RemoteError};

use crate::common::{self, client_for, client_with, error_json, rid};

#[tokio::test]
async fn test_check_connection_sends_auth_and_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", format!("Bearer {}", common::TOKEN).as_str()))
        .and(header("notion-version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "user",
            "id": "u1",
            "type": "bot",
            "name": "notesync"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).check_connection().await.unwrap();
}

#[tokio::test]
async fn test_check_connection_rejects_non_user_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "object": "list" })))
        .mount(&server)
        .await;

    let err = client_for(&server).check_connection().await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unauthorized_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_json(
            401,
            "unauthorized",
            "API token is invalid.",
        )))
        .mount(&server)
        .await;

    let err = client_for(&server).check_connection().await.unwrap_err();
    assert_eq!(err, RemoteError::Unauthorized("API token is invalid.".to_string()));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_forbidden_maps_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pages/R1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(error_json(
            403,
            "restricted_resource",
            "Insufficient permissions",
        )))
        .mount(&server)
        .await;

    let err = client_for(&server).get_metadata(&rid("R1")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized(_)));
}

#[tokio::test]
async fn test_rate_limited_parses_retry_after_and_throttles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "7")
                .set_body_json(error_json(429, "rate_limited", "slow down")),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let before = client.rate_limiter().bucket().effective_rate();
    let err = client.check_connection().await.unwrap_err();

    assert_eq!(
        err,
        RemoteError::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );
    assert!(err.is_transient());
    assert!(client.rate_limiter().bucket().effective_rate() < before);
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client_for(&server).check_connection().await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Server {
            status: 502,
            message: "bad gateway".to_string()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_validation_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pages/R1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(error_json(
            400,
            "validation_error",
            "path failed validation",
        )))
        .mount(&server)
        .await;

    let err = client_for(&server).get_metadata(&rid("R1")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Rejected { status: 400, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "object": "user" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_with(&server, |c| c.request_timeout_secs = 1);
    let err = client.check_connection().await.unwrap_err();
    assert_eq!(err, RemoteError::Timeout);
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    let err = client.check_connection().await.unwrap_err();
    assert!(matches!(err, RemoteError::Network(_)));
}
