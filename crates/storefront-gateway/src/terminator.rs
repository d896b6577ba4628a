//! Session termination and lifecycle events.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::store::TokenStore;

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 32;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The refresh token was rejected, absent, or unreachable.
    RefreshFailed,
    /// The user logged out.
    Logout,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::RefreshFailed => write!(f, "refresh failed"),
            TerminationReason::Logout => write!(f, "logout"),
        }
    }
}

/// Session lifecycle notifications for the surrounding application.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A login stored a new session.
    LoggedIn { user: Value },
    /// The access token was refreshed.
    Refreshed,
    /// The session was destroyed; the application should return to an
    /// unauthenticated entry point.
    Terminated { reason: TerminationReason },
}

/// Error returned by a [`TerminationHook`].
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Collaborator callback that drops state tied to the session (cart, profile).
#[async_trait]
pub trait TerminationHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn on_session_terminated(
        &self,
        reason: TerminationReason,
    ) -> std::result::Result<(), HookError>;
}

/// Clears the session and notifies collaborators.
pub struct SessionTerminator {
    store: Arc<TokenStore>,
    hooks: Vec<Arc<dyn TerminationHook>>,
    events: broadcast::Sender<SessionEvent>,
}

impl fmt::Debug for SessionTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTerminator")
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl SessionTerminator {
    pub fn new(
        store: Arc<TokenStore>,
        hooks: Vec<Arc<dyn TerminationHook>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            hooks,
            events,
        }
    }

    /// Create a terminator with its own event channel.
    pub fn standalone(store: Arc<TokenStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::new(store, Vec::new(), events)
    }

    /// Clear the store, run every hook, then emit [`SessionEvent::Terminated`].
    ///
    /// Failures are logged; a failing hook does not stop the others.
    pub async fn terminate(&self, reason: TerminationReason) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }

        for hook in &self.hooks {
            if let Err(e) = hook.on_session_terminated(reason).await {
                tracing::warn!(hook = hook.name(), error = %e, "termination hook failed");
            }
        }

        tracing::info!(%reason, "session terminated");
        self.emit(SessionEvent::Terminated { reason });
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Send an event; having no subscribers is fine.
    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Create the session event channel.
pub(crate) fn event_channel() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}
