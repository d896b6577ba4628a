//! CLI command handlers.

pub mod auth;
pub mod request;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use storefront_config::StorefrontConfig;
use storefront_gateway::{
    FileStorage, Gateway, GatewayError, HookError, SessionStorage, TerminationHook,
    TerminationReason,
};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration, CLI flags applied.
    pub config: StorefrontConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Build a gateway over the persisted session file.
    pub fn gateway(&self) -> Result<Gateway> {
        let session_file = self.config.session.session_file();
        let storage: Arc<dyn SessionStorage> = Arc::new(
            FileStorage::open(&session_file).with_context(|| {
                format!("Failed to open session file {}", session_file.display())
            })?,
        );

        let api = &self.config.api;
        let mut builder = Gateway::builder()
            .base_url(api.effective_base_url())
            .timeout(api.effective_timeout())
            .storage(storage)
            .refresh_policy(self.config.session.effective_refresh_policy())
            .termination_hook(Arc::new(ReloginNotice {
                quiet: self.json_output,
            }));
        if let Some(agent) = &api.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        Ok(builder.build()?)
    }
}

/// Turn a gateway error into the message shown to the user.
pub fn describe(err: GatewayError) -> anyhow::Error {
    tracing::debug!(error = %err, "request failed");
    anyhow::anyhow!(err.user_message())
}

/// Tells the user to log in again when a refresh fails mid-command.
struct ReloginNotice {
    quiet: bool,
}

#[async_trait]
impl TerminationHook for ReloginNotice {
    fn name(&self) -> &str {
        "relogin-notice"
    }

    async fn on_session_terminated(&self, reason: TerminationReason) -> Result<(), HookError> {
        if reason == TerminationReason::RefreshFailed && !self.quiet {
            eprintln!("Session expired. Run 'storefront auth login' to sign in again.");
        }
        Ok(())
    }
}
