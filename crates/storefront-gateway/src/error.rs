//! Gateway error types.

use thiserror::Error;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The access token was rejected, and so was the replay with a refreshed one.
    #[error("Authentication failed: {0}")]
    AuthExpired(String),

    /// The refresh token was rejected or absent. The session has been terminated.
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// No response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Server returned a non-success status other than a refreshable 401.
    #[error("API error ({status}): {}", .detail.as_deref().unwrap_or("no details"))]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error code from the response body, if any.
        code: Option<String>,
        /// Error message from the response body, if any.
        detail: Option<String>,
    },

    /// A success response did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Network(e.to_string())
    }
}

impl GatewayError {
    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Server { status, .. } => Some(*status),
            GatewayError::AuthExpired(_) => Some(401),
            _ => None,
        }
    }

    /// Check if this is an authentication error of any kind.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            GatewayError::AuthExpired(_)
                | GatewayError::SessionInvalid(_)
                | GatewayError::Server { status: 401, .. }
        )
    }

    /// Check if the session was terminated by this failure.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, GatewayError::SessionInvalid(_))
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GatewayError::Server { status: 429, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, GatewayError::Server { status, .. } if *status >= 500)
    }

    /// Check if no response was received.
    pub fn is_network_error(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::AuthExpired(_)
            | GatewayError::SessionInvalid(_)
            | GatewayError::Server { status: 401, .. } => {
                "Authentication failed, please sign in again".to_string()
            }
            GatewayError::Server { status, detail, .. } => {
                let detail = detail.as_deref().filter(|d| !d.is_empty());
                match (*status, detail) {
                    (400, Some(d)) | (422, Some(d)) => d.to_string(),
                    (400, None) => "Invalid request parameters".to_string(),
                    (403, _) => "You do not have permission to perform this action".to_string(),
                    (404, _) => "The requested resource does not exist".to_string(),
                    (422, None) => "Validation failed".to_string(),
                    (429, _) => "Too many requests, please try again later".to_string(),
                    (500, _) => "Server error, please try again later".to_string(),
                    (_, Some(d)) => d.to_string(),
                    (_, None) => "An unknown error occurred".to_string(),
                }
            }
            GatewayError::Network(_) => {
                "Network connection error, please check your connection".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error body returned by the API.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Map a failed response into a [`GatewayError::Server`].
    pub(crate) fn into_error(status: u16, body: &[u8]) -> GatewayError {
        let parsed: ErrorResponse = serde_json::from_slice(body).unwrap_or_default();
        GatewayError::Server {
            status,
            code: parsed.code,
            detail: parsed.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(status: u16, detail: Option<&str>) -> GatewayError {
        GatewayError::Server {
            status,
            code: None,
            detail: detail.map(String::from),
        }
    }

    #[test]
    fn test_classification() {
        assert!(server(401, None).is_auth_error());
        assert!(GatewayError::SessionInvalid("x".into()).is_session_invalid());
        assert!(server(503, None).is_server_error());
        assert!(!server(404, None).is_server_error());
        assert!(server(429, None).is_rate_limited());
        assert!(GatewayError::Network("refused".into()).is_network_error());
        assert_eq!(GatewayError::AuthExpired("x".into()).status(), Some(401));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(server(400, Some("bad sku")).user_message(), "bad sku");
        assert_eq!(server(400, None).user_message(), "Invalid request parameters");
        assert_eq!(server(422, None).user_message(), "Validation failed");
        assert_eq!(
            server(404, Some("ignored")).user_message(),
            "The requested resource does not exist"
        );
        assert_eq!(server(418, None).user_message(), "An unknown error occurred");
        assert!(
            GatewayError::SessionInvalid("expired".into())
                .user_message()
                .contains("sign in again")
        );
    }

    #[test]
    fn test_error_body_parsing() {
        let err =
            ErrorResponse::into_error(409, br#"{"code":"conflict","message":"Out of stock"}"#);
        match err {
            GatewayError::Server {
                status,
                code,
                detail,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code.as_deref(), Some("conflict"));
                assert_eq!(detail.as_deref(), Some("Out of stock"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let err = ErrorResponse::into_error(502, b"<html>bad gateway</html>");
        assert_eq!(err.to_string(), "API error (502): no details");
    }
}
