//! Single-flight access token refresh.
//!
//! The coordinator is either idle or running one refresh episode. The first
//! request to report a 401 starts an episode; every 401 reported while it is
//! in flight joins it as a waiter instead of calling the refresh endpoint
//! again. When the refresh completes, the waiter list is taken and the state
//! reset under a single lock acquisition, then every waiter receives the same
//! outcome.
//!
//! The refresh itself runs on a spawned task so that it completes even if
//! every waiting caller is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{GatewayError, Result};
use crate::refresh::{RefreshClient, RefreshPolicy};
use crate::store::TokenStore;
use crate::terminator::{SessionEvent, SessionTerminator, TerminationReason};

/// Outcome broadcast to waiters: the new access token, or why the session died.
type Outcome = std::result::Result<String, String>;

/// How a refresh episode ended.
#[derive(Debug)]
enum Settled {
    /// New tokens were stored.
    Refreshed(String),
    /// Another session (a new login) replaced the one being refreshed.
    Superseded(String),
    /// The session was cleared (logout) while the refresh was in flight.
    Ended(String),
    /// The refresh failed; the session must be terminated.
    Failed(String),
}

/// Waiters on the one refresh call currently in flight.
#[derive(Debug, Default)]
struct RefreshEpisode {
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Coordinates access token refresh across concurrent requests.
#[derive(Debug)]
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    refresher: Arc<dyn RefreshClient>,
    terminator: Arc<SessionTerminator>,
    policy: RefreshPolicy,
    episode: Mutex<Option<RefreshEpisode>>,
    episodes: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn RefreshClient>,
        terminator: Arc<SessionTerminator>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            store,
            refresher,
            terminator,
            policy,
            episode: Mutex::new(None),
            episodes: AtomicU64::new(0),
        }
    }

    /// Whether a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.episode.lock().is_some()
    }

    /// Number of refresh episodes started so far.
    pub fn episodes(&self) -> u64 {
        self.episodes.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Obtain an access token to replay a request that was rejected with 401.
    ///
    /// `rejected_token` is the access token the request was sent with. If the
    /// store already holds a different one (a refresh finished in between), it
    /// is returned immediately. Otherwise the caller joins the in-flight
    /// episode or starts a new one.
    ///
    /// Fails with [`GatewayError::SessionInvalid`] when the refresh fails; by
    /// then the session has been terminated.
    pub async fn recover(self: &Arc<Self>, rejected_token: Option<&str>) -> Result<String> {
        let (tx, rx) = oneshot::channel();

        {
            let mut episode = self.episode.lock();
            match episode.as_mut() {
                Some(in_flight) => {
                    tracing::debug!(
                        waiters = in_flight.waiters.len() + 1,
                        "joining in-flight refresh"
                    );
                    in_flight.waiters.push(tx);
                }
                None => {
                    if let Some(current) = self.store.access_token()
                        && rejected_token != Some(current.as_str())
                    {
                        tracing::debug!("access token already refreshed, replaying");
                        return Ok(current);
                    }

                    *episode = Some(RefreshEpisode { waiters: vec![tx] });
                    let n = self.episodes.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::debug!(episode = n, "starting token refresh");

                    let this = Arc::clone(self);
                    tokio::spawn(async move { this.run_episode().await });
                }
            }
        }

        match rx.await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(reason)) => Err(GatewayError::SessionInvalid(reason)),
            Err(_) => Err(GatewayError::SessionInvalid(
                "refresh ended without an outcome".to_string(),
            )),
        }
    }

    async fn run_episode(&self) {
        let outcome = match self.perform_refresh().await {
            Settled::Refreshed(token) => {
                tracing::info!("access token refreshed");
                self.terminator.emit(SessionEvent::Refreshed);
                Ok(token)
            }
            Settled::Superseded(token) => {
                tracing::debug!("session replaced while refreshing, keeping the new one");
                Ok(token)
            }
            Settled::Ended(reason) => {
                tracing::debug!(%reason, "session ended while refreshing");
                Err(reason)
            }
            Settled::Failed(reason) => {
                tracing::warn!(%reason, "token refresh failed, ending session");
                self.terminator
                    .terminate(TerminationReason::RefreshFailed)
                    .await;
                Err(reason)
            }
        };

        let waiters = self
            .episode
            .lock()
            .take()
            .map(|episode| episode.waiters)
            .unwrap_or_default();

        tracing::debug!(waiters = waiters.len(), "resolving refresh waiters");
        for waiter in waiters {
            // A dropped receiver means the caller gave up; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Call the refresh endpoint once and store the result.
    ///
    /// The result is written only if the held session still carries the
    /// refresh token that was sent; a session replaced or cleared meanwhile
    /// is left alone.
    async fn perform_refresh(&self) -> Settled {
        let Some(refresh_token) = self.store.refresh_token() else {
            return Settled::Failed("no refresh token available".to_string());
        };

        let result = self
            .refresher
            .refresh(&refresh_token)
            .await
            .map_err(|e| e.to_string())
            .and_then(|pair| {
                let next_refresh = match self.policy {
                    RefreshPolicy::Rotate => pair.refresh_token.ok_or_else(|| {
                        "refresh response did not include a rotated refresh token".to_string()
                    })?,
                    RefreshPolicy::Reuse => refresh_token.clone(),
                };
                Ok((pair.access_token, next_refresh))
            });

        let (access_token, next_refresh) = match result {
            Ok(tokens) => tokens,
            Err(reason) => return self.displaced(&refresh_token).unwrap_or(Settled::Failed(reason)),
        };

        let swapped = self.store.replace_if_current(&refresh_token, |session| {
            session.refreshed(access_token.clone(), Some(next_refresh))
        });
        match swapped {
            Ok(true) => Settled::Refreshed(access_token),
            Ok(false) => self
                .displaced(&refresh_token)
                .unwrap_or_else(|| Settled::Ended("session ended while refreshing".to_string())),
            Err(e) => {
                tracing::warn!(error = %e, "refreshed session could not be persisted");
                Settled::Refreshed(access_token)
            }
        }
    }

    /// How an episode settles when its session is no longer the held one.
    fn displaced(&self, refresh_token: &str) -> Option<Settled> {
        match self.store.get() {
            None => Some(Settled::Ended("session ended while refreshing".to_string())),
            Some(current) if current.refresh_token.as_deref() != Some(refresh_token) => {
                Some(Settled::Superseded(current.access_token))
            }
            Some(_) => None,
        }
    }
}
