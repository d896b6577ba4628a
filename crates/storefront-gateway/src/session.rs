//! Session and token types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An authenticated session.
///
/// Created by login, replaced by refresh, destroyed by logout or a failed
/// refresh. Tokens are redacted from `Debug` output.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    /// Absent when the login response did not include one; such a session
    /// cannot be refreshed.
    pub refresh_token: Option<String>,
    /// Opaque user record as returned by the API.
    pub user: Value,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Create a session issued now.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        user: Value,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            user,
            issued_at: Utc::now(),
        }
    }

    /// A copy of this session carrying refreshed tokens and a new issue time.
    pub fn refreshed(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
            user: self.user.clone(),
            issued_at: Utc::now(),
        }
    }

    /// Shallow-merge `profile` into the user record.
    ///
    /// Object keys in `profile` overwrite existing ones; a non-object user
    /// record is replaced outright.
    pub fn merge_user(&mut self, profile: Value) {
        match (&mut self.user, profile) {
            (Value::Object(existing), Value::Object(update)) => {
                existing.extend(update);
            }
            (_, Value::Null) => {}
            (user, update) => *user = update,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("user", &self.user)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Token pair returned by the refresh endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("rotated", &self.refresh_token.is_some())
            .finish()
    }
}

impl TokenPair {
    /// Extract tokens from an auth response body.
    ///
    /// Accepts `accessToken`/`refreshToken` at the top level or inside a
    /// `data` envelope. Returns `None` without a non-empty access token.
    pub fn from_response(body: &Value) -> Option<Self> {
        let body = unwrap_envelope(body);
        let access_token = non_empty_str(body, "accessToken")?;
        Some(Self {
            access_token,
            refresh_token: non_empty_str(body, "refreshToken"),
        })
    }
}

/// Return the `data` member when the API wrapped its payload, else `body`.
pub(crate) fn unwrap_envelope(body: &Value) -> &Value {
    match body.get("data") {
        Some(data @ Value::Object(_)) => data,
        _ => body,
    }
}

fn non_empty_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
