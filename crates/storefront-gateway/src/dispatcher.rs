//! Request dispatch with bearer injection and one-shot 401 recovery.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::coordinator::RefreshCoordinator;
use crate::error::{ErrorResponse, GatewayError, Result};
use crate::store::TokenStore;

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ─────────────────────────────────────────────────────────────────────────────
// Request / response
// ─────────────────────────────────────────────────────────────────────────────

/// A replayable description of an outbound call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the API base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Return 401 to the caller as-is instead of attempting a refresh.
    /// Set for the credential endpoints themselves.
    pub skip_refresh: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            skip_refresh: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize and attach a JSON body.
    pub fn json_from<B: Serialize + ?Sized>(self, body: &B) -> Result<Self> {
        Ok(self.json(serde_json::to_value(body)?))
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn without_refresh(mut self) -> Self {
        self.skip_refresh = true;
        self
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ErrorResponse::into_error(self.status, &self.body))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Sends requests with the current access token and recovers from one 401.
#[derive(Debug)]
pub struct Dispatcher {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl Dispatcher {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        timeout: Duration,
        store: Arc<TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http,
            base_url,
            timeout,
            store,
            coordinator,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL for an API path.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Send a request, recovering once from an expired access token.
    ///
    /// On 401 the request waits for the refresh coordinator and is replayed
    /// exactly once with the new token. A 401 on the replay is returned as
    /// [`GatewayError::AuthExpired`]. Other failures are returned untouched.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        let sent_with = self.store.access_token();
        let response = self.execute(request, sent_with.as_deref()).await?;

        if response.status != 401 || request.skip_refresh {
            return response.into_result();
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            "access token rejected, awaiting refresh"
        );
        let token = self.coordinator.recover(sent_with.as_deref()).await?;

        let replay = self.execute(request, Some(&token)).await?;
        if replay.status == 401 {
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                "replayed request rejected again"
            );
            return Err(GatewayError::AuthExpired(format!(
                "{} {} rejected after token refresh",
                request.method, request.path
            )));
        }

        replay.into_result()
    }

    /// One HTTP attempt. Only transport failures are errors here.
    async fn execute(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<ApiResponse> {
        let url = self.url(&request.path)?;

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .timeout(self.timeout)
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder = builder.headers(request_headers(request, token)?);

        tracing::debug!(method = %request.method, path = %request.path, "dispatching request");
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Caller headers plus the bearer token. An injected token replaces any
/// caller-supplied `Authorization` header.
fn request_headers(request: &RequestDescriptor, token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| GatewayError::Config(format!("Invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| GatewayError::Config(format!("Invalid value for header {}", name)))?;
        headers.append(name, value);
    }
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| GatewayError::Config("Invalid access token".to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_builder() {
        let request = RequestDescriptor::post("cart/items/add")
            .json(json!({"productId": 3, "quantity": 1}))
            .query("source", "cli")
            .header("X-Trace", "1");

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, vec![("source".to_string(), "cli".to_string())]);
        assert!(!request.skip_refresh);
        assert!(request.without_refresh().skip_refresh);
    }

    #[test]
    fn test_response_json() {
        let response = ApiResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: br#"{"id": 5}"#.to_vec(),
        };
        let value: Value = response.json().unwrap();
        assert_eq!(value["id"], 5);

        let empty = ApiResponse {
            status: 204,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        let value: Option<Value> = empty.json().unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_injected_token_replaces_caller_authorization() {
        let request = RequestDescriptor::get("orders")
            .header("Authorization", "Bearer caller")
            .header("X-Locale", "en");

        let headers = request_headers(&request, Some("t1")).unwrap();
        let values: Vec<_> = headers.get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values, vec!["Bearer t1"]);
        assert_eq!(headers.get("x-locale").unwrap(), "en");

        // Without a session the caller's header goes out as given.
        let headers = request_headers(&request, None).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer caller");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let request = RequestDescriptor::get("orders").header("bad header", "x");
        assert!(matches!(
            request_headers(&request, None),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_failed_response_maps_to_server_error() {
        let response = ApiResponse {
            status: 500,
            headers: HeaderMap::new(),
            body: br#"{"message":"boom"}"#.to_vec(),
        };
        let err = response.into_result().unwrap_err();
        assert!(err.is_server_error());
        assert_eq!(err.user_message(), "Server error, please try again later");
    }
}
