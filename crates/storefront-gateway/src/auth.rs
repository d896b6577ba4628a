//! Auth API: login, registration, logout and profile.

use serde::Serialize;
use serde_json::Value;

use crate::client::Gateway;
use crate::dispatcher::RequestDescriptor;
use crate::error::{GatewayError, Result};
use crate::session::{Session, TokenPair, unwrap_envelope};
use crate::terminator::{SessionEvent, TerminationReason};

const LOGIN_PATH: &str = "users/login";
const REGISTER_PATH: &str = "users/register";
const LOGOUT_PATH: &str = "users/logout";
const PROFILE_PATH: &str = "users/profile";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Registration form.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// Auth API client.
pub struct AuthApi {
    gateway: Gateway,
}

impl AuthApi {
    pub(crate) fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Log in and store the resulting session.
    ///
    /// The profile is fetched afterwards and merged into the stored user
    /// record; a failed profile fetch does not fail the login.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let request = RequestDescriptor::post(LOGIN_PATH)
            .json_from(&LoginRequest { username, password })?
            .without_refresh();
        let body: Value = self.gateway.send(&request).await?.json()?;

        let tokens = TokenPair::from_response(&body).ok_or_else(|| {
            GatewayError::InvalidResponse("login response has no access token".to_string())
        })?;
        let user = unwrap_envelope(&body).get("user").cloned().unwrap_or(Value::Null);

        let inner = self.gateway.inner();
        if let Err(e) = inner
            .store
            .set(Session::new(tokens.access_token, tokens.refresh_token, user.clone()))
        {
            tracing::warn!(error = %e, "session could not be persisted");
        }
        tracing::info!(username, "logged in");

        if let Err(e) = self.fetch_profile().await {
            tracing::warn!(error = %e, "failed to load profile after login");
        }

        inner.terminator.emit(SessionEvent::LoggedIn { user });

        inner
            .store
            .get()
            .ok_or_else(|| GatewayError::SessionInvalid("session ended during login".to_string()))
    }

    /// Register a new account, then log in with it.
    pub async fn register(&self, form: &RegisterRequest) -> Result<Session> {
        let request = RequestDescriptor::post(REGISTER_PATH)
            .json_from(form)?
            .without_refresh();
        self.gateway.send(&request).await?;
        tracing::info!(username = %form.username, "registered");

        self.login(&form.username, &form.password).await
    }

    /// Fetch the profile and merge it into the stored user record.
    pub async fn fetch_profile(&self) -> Result<Value> {
        let body: Value = self.gateway.get(PROFILE_PATH).await?;
        let profile = unwrap_envelope(&body).clone();
        self.gateway.store().merge_user(profile.clone())?;
        Ok(profile)
    }

    /// Log out.
    ///
    /// The logout endpoint is called best effort; the local session is
    /// terminated regardless of its outcome.
    pub async fn logout(&self) {
        if self.gateway.store().is_authenticated() {
            let request = RequestDescriptor::post(LOGOUT_PATH).without_refresh();
            if let Err(e) = self.gateway.send(&request).await {
                tracing::warn!(error = %e, "logout request failed");
            }
        }

        self.gateway
            .inner()
            .terminator
            .terminate(TerminationReason::Logout)
            .await;
    }

    /// The stored user record, if logged in.
    pub fn current_user(&self) -> Option<Value> {
        self.gateway.store().get().map(|s| s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.gateway.store().is_authenticated()
    }
}
