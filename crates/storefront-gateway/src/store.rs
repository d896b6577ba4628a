//! Token store: the single source of truth for the current session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::Result;
use crate::session::Session;
use crate::storage::{MemoryStorage, SessionStorage, keys};

/// Holds the current [`Session`] in memory and mirrors it to storage.
///
/// Reads never touch storage. Writes update memory first, then persist;
/// a persistence failure is returned but the in-memory state stands.
#[derive(Debug)]
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
    current: RwLock<Option<Session>>,
}

impl TokenStore {
    /// Create a store backed by `storage`, loading any persisted session.
    pub fn load(storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let current = Self::read_persisted(storage.as_ref())?;
        if current.is_some() {
            tracing::debug!("restored persisted session");
        }
        Ok(Self {
            storage,
            current: RwLock::new(current),
        })
    }

    /// Create an empty store that persists nowhere.
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            current: RwLock::new(None),
        }
    }

    /// Current session, if any.
    pub fn get(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .read()
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
    }

    /// Whether a session with a non-empty access token is held.
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|s| !s.access_token.is_empty())
    }

    /// Replace the stored session and persist it.
    pub fn set(&self, session: Session) -> Result<()> {
        let mut current = self.current.write();
        let result = self.persist(&session);
        *current = Some(session);
        result
    }

    /// Replace the session with `update(current)`, but only while the held
    /// session still carries `refresh_token`.
    ///
    /// Returns `Ok(false)` when the session was cleared or replaced in the
    /// meantime. An `Err` means the swap happened but could not be persisted.
    pub fn replace_if_current<F>(&self, refresh_token: &str, update: F) -> Result<bool>
    where
        F: FnOnce(&Session) -> Session,
    {
        let mut current = self.current.write();
        let next = match current.as_ref() {
            Some(session) if session.refresh_token.as_deref() == Some(refresh_token) => {
                update(session)
            }
            _ => return Ok(false),
        };
        let result = self.persist(&next);
        *current = Some(next);
        result.map(|()| true)
    }

    /// Shallow-merge `profile` into the stored user record.
    ///
    /// Does nothing when no session is held.
    pub fn merge_user(&self, profile: Value) -> Result<()> {
        let mut current = self.current.write();
        let Some(session) = current.as_mut() else {
            return Ok(());
        };
        session.merge_user(profile);
        let user = serde_json::to_string(&session.user)?;
        self.storage.set_item(keys::USER, &user)
    }

    /// Remove the session and its persisted copy. Idempotent.
    pub fn clear(&self) -> Result<()> {
        let mut current = self.current.write();
        *current = None;
        let removals: Vec<(&str, Option<&str>)> = keys::ALL.iter().map(|k| (*k, None)).collect();
        self.storage.write_items(&removals)
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user)?;
        let issued_at = session.issued_at.to_rfc3339();
        self.storage.write_items(&[
            (keys::ACCESS_TOKEN, Some(session.access_token.as_str())),
            (keys::REFRESH_TOKEN, session.refresh_token.as_deref()),
            (keys::USER, Some(user.as_str())),
            (keys::ISSUED_AT, Some(issued_at.as_str())),
        ])
    }

    fn read_persisted(storage: &dyn SessionStorage) -> Result<Option<Session>> {
        let Some(access_token) = storage
            .get_item(keys::ACCESS_TOKEN)?
            .filter(|t| !t.is_empty())
        else {
            return Ok(None);
        };

        let refresh_token = storage
            .get_item(keys::REFRESH_TOKEN)?
            .filter(|t| !t.is_empty());

        let user = match storage.get_item(keys::USER)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unreadable persisted user record");
                Value::Null
            }),
            None => Value::Null,
        };

        let issued_at = storage
            .get_item(keys::ISSUED_AT)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Some(Session {
            access_token,
            refresh_token,
            user,
            issued_at,
        }))
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
