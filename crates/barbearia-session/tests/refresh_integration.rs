//! Refresh coordinator integration tests against a mock HTTP server.
//!
//! These verify the single-flight guarantees end to end: one refresh call per
//! burst of 401s, at most one replay per request, and no lost callers.

mod common;

use std::time::Duration;

use futures::future::join_all;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use barbearia_session::{ApiRequest, SessionError, SessionEvent, SessionClient};

use common::{client_for, mount_refresh, mount_resource, token_envelope};

#[tokio::test]
async fn test_login_refresh_and_replay() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_envelope("A1", "R1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_resource(&server, "/api/services", "A1", "A2", 1, 1).await;
    mount_refresh(
        &server,
        "R1",
        ResponseTemplate::new(200).set_body_json(token_envelope("A2", "R2")),
        1,
    )
    .await;

    let client = client_for(&server);
    client.auth().login("ana@example.com", "secret").await.unwrap();
    assert_eq!(client.store().get_access().as_deref(), Some("A1"));

    let response = client
        .dispatch(ApiRequest::get("services"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(client.store().get_access().as_deref(), Some("A2"));
    assert_eq!(client.store().get_refresh().as_deref(), Some("R2"));
    server.verify().await;
}

#[tokio::test]
async fn test_concurrent_401s_trigger_one_refresh() {
    let server = MockServer::start().await;
    mount_resource(&server, "/api/services", "A1", "A2", 5, 5).await;
    mount_refresh(
        &server,
        "R1",
        ResponseTemplate::new(200)
            .set_body_json(token_envelope("A2", "R2"))
            .set_delay(Duration::from_millis(300)),
        1,
    )
    .await;

    let client = client_for(&server);
    client.store().set_tokens("A1", Some("R1"));

    let calls = (0..5).map(|_| client.dispatch(ApiRequest::get("services")));
    let results = join_all(calls).await;

    for result in results {
        assert_eq!(result.unwrap().status(), 200);
    }
    assert!(!client.coordinator().is_refreshing());
    server.verify().await;
}

#[tokio::test]
async fn test_refresh_failure_fails_all_callers_and_clears_store() {
    let server = MockServer::start().await;
    mount_resource(&server, "/api/services", "A1", "A2", 5, 0).await;
    mount_refresh(
        &server,
        "R1",
        ResponseTemplate::new(500).set_delay(Duration::from_millis(200)),
        1,
    )
    .await;

    let client = client_for(&server);
    client.store().set_tokens("A1", Some("R1"));
    let mut events = client.events().subscribe();

    let calls = (0..5).map(|_| client.dispatch(ApiRequest::get("services")));
    let results = join_all(calls).await;

    for result in results {
        assert!(matches!(result, Err(SessionError::AuthExpired(_))));
    }
    assert!(client.store().get_access().is_none());
    assert!(client.store().get_refresh().is_none());
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Expired {
            redirect_to: "/login".to_string()
        }
    );
    server.verify().await;
}

#[tokio::test]
async fn test_replayed_401_is_not_retried_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        "R1",
        ResponseTemplate::new(200).set_body_json(token_envelope("A2", "R2")),
        1,
    )
    .await;

    let client = client_for(&server);
    client.store().set_tokens("A1", Some("R1"));

    let err = client.dispatch(ApiRequest::get("users")).await.unwrap_err();

    assert!(matches!(err, SessionError::Unauthorized { .. }));
    // The refresh itself succeeded, so the new tokens are kept.
    assert_eq!(client.store().get_access().as_deref(), Some("A2"));
    server.verify().await;
}

#[tokio::test]
async fn test_non_401_errors_pass_through_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "down"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", ResponseTemplate::new(200), 0).await;

    let client = client_for(&server);
    client.store().set_tokens("A1", Some("R1"));

    let response = client
        .dispatch(ApiRequest::get("services"))
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(client.store().get_access().as_deref(), Some("A1"));
    server.verify().await;
}

#[tokio::test]
async fn test_expired_token_is_still_sent() {
    let server = MockServer::start().await;
    let expired = common::token_with(json!({"exp": 1}));
    mount_resource(&server, "/api/services", "unused", &expired, 0, 1).await;

    let client = client_for(&server);
    client.store().set_access(&expired);

    let response = client
        .dispatch(ApiRequest::get("services"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    server.verify().await;
}

#[tokio::test]
async fn test_network_error_is_propagated() {
    let client = SessionClient::builder()
        .base_url("http://127.0.0.1:9/api")
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    client.store().set_tokens("A1", Some("R1"));

    let err = client.dispatch(ApiRequest::get("services")).await.unwrap_err();

    assert!(err.is_network());
    assert_eq!(client.store().get_access().as_deref(), Some("A1"));
}
