//! Common test utilities for integration tests.

#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use barbearia_session::SessionClient;

/// 2100-01-01T00:00:00Z.
pub const FAR_FUTURE: i64 = 4_102_444_800;

/// Build an unsigned token with the given claims.
pub fn token_with(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, body)
}

/// A token that stays valid for the duration of the tests.
pub fn valid_token(sub: &str, role: &str) -> String {
    token_with(json!({"sub": sub, "exp": FAR_FUTURE, "role": role}))
}

/// Client pointed at the mock server's `/api` root, with in-memory storage.
pub fn client_for(server: &MockServer) -> SessionClient {
    SessionClient::builder()
        .base_url(format!("{}/api", server.uri()))
        .build()
        .expect("client should build")
}

/// `{ data: { token, refreshToken } }` envelope.
pub fn token_envelope(access: &str, refresh: &str) -> Value {
    json!({"message": "ok", "data": {"token": access, "refreshToken": refresh}})
}

/// Mount a resource that accepts only `accepted` and rejects `rejected` with 401.
pub async fn mount_resource(
    server: &MockServer,
    route: &str,
    rejected: &str,
    accepted: &str,
    rejected_calls: u64,
    accepted_calls: u64,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("Authorization", format!("Bearer {}", rejected).as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "expired"})))
        .expect(rejected_calls)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(route))
        .and(header("Authorization", format!("Bearer {}", accepted).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2, 3]})))
        .expect(accepted_calls)
        .mount(server)
        .await;
}

/// Mount the refresh endpoint, answering for `refresh` with a rotated pair.
pub async fn mount_refresh(
    server: &MockServer,
    refresh: &str,
    response: ResponseTemplate,
    calls: u64,
) {
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refreshToken": refresh})))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}
