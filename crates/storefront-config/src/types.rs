//! Configuration types.
//!
//! ```toml
//! [api]
//! base_url = "https://shop.example.com/api/v1"
//! timeout_secs = 10
//! user_agent = "storefront/0.1"
//!
//! [session]
//! data_dir = "~/.local/share/storefront"
//! file_name = "session.json"
//! refresh_policy = "reuse"
//! ```
//!
//! Every field is optional so that layers can be merged field by field;
//! the `effective_*` accessors fill in defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1988/api/v1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default name of the persisted session file.
pub const DEFAULT_SESSION_FILE: &str = "session.json";

/// Application name used for platform directories.
pub(crate) const APP_NAME: &str = "storefront";

/// Environment variable overriding `api.base_url`.
pub const BASE_URL_ENV: &str = "STOREFRONT_BASE_URL";

/// Environment variable overriding `api.timeout_secs`.
pub const TIMEOUT_ENV: &str = "STOREFRONT_TIMEOUT_SECS";

/// Environment variable overriding `session.data_dir`.
pub const DATA_DIR_ENV: &str = "STOREFRONT_DATA_DIR";

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    /// API connection settings.
    pub api: ApiConfig,
    /// Session persistence and refresh settings.
    pub session: SessionConfig,
}

impl StorefrontConfig {
    /// Create an empty configuration (all defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: StorefrontConfig) {
        self.api.merge(other.api);
        self.session.merge(other.session);
    }

    /// Apply `STOREFRONT_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment-shaped).
    ///
    /// Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(BASE_URL_ENV) {
            self.api.base_url = Some(url);
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                field: TIMEOUT_ENV.to_string(),
                reason: e.to_string(),
            })?;
            self.api.timeout_secs = Some(secs);
        }

        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.session.data_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "api.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(url) = &self.api.base_url
            && url.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "api.base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [api]
// ─────────────────────────────────────────────────────────────────────────────

/// API connection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Custom user agent.
    pub user_agent: Option<String>,
}

impl ApiConfig {
    fn merge(&mut self, other: ApiConfig) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn effective_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [session]
// ─────────────────────────────────────────────────────────────────────────────

/// What happens to the stored refresh token after a successful refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// The stored refresh token is kept; any returned one is ignored.
    #[default]
    Reuse,
    /// The response must carry a new refresh token, which replaces the old one.
    /// A response without one is a refresh failure.
    Rotate,
}

/// Session persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the session file and logs.
    pub data_dir: Option<PathBuf>,
    /// Session file name within `data_dir`.
    pub file_name: Option<String>,
    /// Refresh token rotation policy.
    pub refresh_policy: Option<RefreshPolicy>,
}

impl SessionConfig {
    fn merge(&mut self, other: SessionConfig) {
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.file_name.is_some() {
            self.file_name = other.file_name;
        }
        if other.refresh_policy.is_some() {
            self.refresh_policy = other.refresh_policy;
        }
    }

    /// Resolution order: configured value, platform data dir, `./.storefront`.
    pub fn effective_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".storefront"))
        })
    }

    pub fn session_file(&self) -> PathBuf {
        self.effective_data_dir()
            .join(self.file_name.as_deref().unwrap_or(DEFAULT_SESSION_FILE))
    }

    pub fn effective_refresh_policy(&self) -> RefreshPolicy {
        self.refresh_policy.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::new();
        assert_eq!(config.api.effective_base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.api.effective_timeout().as_secs(), 10);
        assert_eq!(config.session.effective_refresh_policy(), RefreshPolicy::Reuse);
        assert!(config.session.session_file().ends_with("session.json"));
    }

    #[test]
    fn test_parse_full() {
        let config = StorefrontConfig::from_toml(
            r#"
[api]
base_url = "https://shop.example.com/api/v1"
timeout_secs = 5

[session]
data_dir = "/tmp/storefront"
refresh_policy = "rotate"
"#,
        )
        .unwrap();

        assert_eq!(
            config.api.effective_base_url(),
            "https://shop.example.com/api/v1"
        );
        assert_eq!(config.api.timeout_secs, Some(5));
        assert_eq!(config.session.refresh_policy, Some(RefreshPolicy::Rotate));
        assert_eq!(
            config.session.session_file(),
            PathBuf::from("/tmp/storefront/session.json")
        );
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = StorefrontConfig::from_toml("[session]\nrefresh_policy = \"sometimes\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_merge_is_field_by_field() {
        let mut base = StorefrontConfig::from_toml(
            "[api]\nbase_url = \"http://a\"\ntimeout_secs = 3\n",
        )
        .unwrap();
        let overlay = StorefrontConfig::from_toml("[api]\ntimeout_secs = 7\n").unwrap();

        base.merge(overlay);
        assert_eq!(base.api.base_url.as_deref(), Some("http://a"));
        assert_eq!(base.api.timeout_secs, Some(7));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (BASE_URL_ENV, "http://override"),
            (TIMEOUT_ENV, "30"),
            (DATA_DIR_ENV, ""),
        ]
        .into_iter()
        .collect();

        let mut config = StorefrontConfig::new();
        config
            .apply_overrides_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api.base_url.as_deref(), Some("http://override"));
        assert_eq!(config.api.timeout_secs, Some(30));
        assert_eq!(config.session.data_dir, None);
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = StorefrontConfig::new();
        let err = config
            .apply_overrides_from(|k| (k == TIMEOUT_ENV).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = StorefrontConfig::from_toml("[api]\ntimeout_secs = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_policy() {
        let mut config = StorefrontConfig::new();
        config.session.refresh_policy = Some(RefreshPolicy::Reuse);
        let text = config.to_toml().unwrap();
        assert!(text.contains("refresh_policy = \"reuse\""));
    }
}
