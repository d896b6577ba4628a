//! Shared helpers for gateway integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use storefront_gateway::{
    Gateway, GatewayBuilder, MemoryStorage, RefreshPolicy, Session, SessionStorage,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const STALE: &str = "stale-access";
pub const FRESH: &str = "fresh-access";

/// Builder pointed at the mock server's `/api/v1`.
pub fn builder(server: &MockServer) -> GatewayBuilder {
    Gateway::builder()
        .base_url(format!("{}/api/v1", server.uri()))
        .timeout(Duration::from_secs(5))
}

/// Gateway holding an expired session (`STALE` / `r1`).
pub fn gateway_with_session(server: &MockServer, policy: RefreshPolicy) -> Gateway {
    let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
    let gateway = builder(server)
        .storage(storage)
        .refresh_policy(policy)
        .build()
        .unwrap();
    gateway
        .store()
        .set(Session::new(STALE, Some("r1".to_string()), json!({"id": 1})))
        .unwrap();
    gateway
}

/// `GET /api/v1/{route}` answers 401 to the stale token.
pub async fn reject_stale(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/{route}")))
        .and(header("authorization", format!("Bearer {STALE}").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})))
        .mount(server)
        .await;
}

/// `GET /api/v1/{route}` answers 200 to the fresh token, exactly `times` times.
pub async fn accept_fresh(server: &MockServer, route: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/{route}")))
        .and(header("authorization", format!("Bearer {FRESH}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Refresh endpoint issuing `FRESH` / `r2` after `delay`, exactly `times` times.
pub async fn refresh_succeeds(server: &MockServer, delay: Duration, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/users/refresh-token"))
        .and(body_json(
            json!({"refreshToken": "r1", "grantType": "refresh_token"}),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": FRESH, "refreshToken": "r2"}))
                .set_delay(delay),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Refresh endpoint rejecting the refresh token, exactly `times` times.
pub async fn refresh_rejected(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/users/refresh-token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "refresh token revoked"}))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Received requests whose bearer token equals `token`.
pub async fn requests_with_token(server: &MockServer, token: &str) -> Vec<Request> {
    let expected = format!("Bearer {token}");
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some(expected.as_str())
        })
        .collect()
}
