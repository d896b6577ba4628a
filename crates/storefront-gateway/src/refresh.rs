//! Refresh endpoint transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::error::{ErrorResponse, GatewayError, Result};
use crate::session::TokenPair;

/// Refresh endpoint path, relative to the API base URL.
pub const REFRESH_PATH: &str = "users/refresh-token";

pub use storefront_config::RefreshPolicy;

/// Exchanges a refresh token for new tokens.
#[async_trait]
pub trait RefreshClient: Send + Sync + std::fmt::Debug {
    /// Call the refresh endpoint once. Any error means the refresh failed.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    grant_type: &'static str,
}

/// Refresh client that posts to `users/refresh-token`.
///
/// Talks to the endpoint directly; refresh calls never pass through the
/// dispatcher's 401 handling.
#[derive(Debug, Clone)]
pub struct HttpRefreshClient {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpRefreshClient {
    pub fn new(http: reqwest::Client, base_url: &Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http,
            url: base_url.join(REFRESH_PATH)?,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RefreshClient for HttpRefreshClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let body = RefreshRequest {
            refresh_token,
            grant_type: "refresh_token",
        };

        let response = self
            .http
            .post(self.url.clone())
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("Token refresh request failed: {}", e)))?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        if !(200..300).contains(&status) {
            return Err(ErrorResponse::into_error(status, &bytes));
        }

        let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            GatewayError::InvalidResponse(format!("Failed to parse refresh response: {}", e))
        })?;

        TokenPair::from_response(&value).ok_or_else(|| {
            GatewayError::InvalidResponse("refresh response has no access token".to_string())
        })
    }
}
