//! Key/value persistence for session state.
//!
//! Mirrors origin-scoped browser storage: string values under string keys.
//! [`FileStorage`] keeps all keys in one JSON document; [`MemoryStorage`]
//! is for tests and throwaway sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{GatewayError, Result};

/// Well-known storage keys.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const USER: &str = "user";
    pub const ISSUED_AT: &str = "issuedAt";

    pub const ALL: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, USER, ISSUED_AT];
}

/// String key/value storage backend.
pub trait SessionStorage: Send + Sync + std::fmt::Debug {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// Write several keys. `None` values remove the key.
    fn write_items(&self, items: &[(&str, Option<&str>)]) -> Result<()> {
        for (key, value) in items {
            match value {
                Some(v) => self.set_item(key, v)?,
                None => self.remove_item(key)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStorage
// ============================================================================

/// JSON-file storage. The whole map is rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the file at `path`, loading existing items if it exists.
    ///
    /// A file that does not parse is treated as empty and overwritten by the
    /// next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                GatewayError::Storage(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).unwrap_or_else(|e| {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "discarding unreadable session file"
                    );
                    BTreeMap::new()
                })
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if items.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).map_err(|e| {
                    GatewayError::Storage(format!(
                        "Failed to delete {}: {}",
                        self.path.display(),
                        e
                    ))
                })?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatewayError::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, json).map_err(|e| {
            GatewayError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.write_items(&[(key, Some(value))])
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.write_items(&[(key, None)])
    }

    fn write_items(&self, updates: &[(&str, Option<&str>)]) -> Result<()> {
        let mut items = self.items.lock();
        for (key, value) in updates {
            match value {
                Some(v) => {
                    items.insert(key.to_string(), v.to_string());
                }
                None => {
                    items.remove(*key);
                }
            }
        }
        self.flush(&items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        storage.set_item(keys::ACCESS_TOKEN, "a").unwrap();
        assert_eq!(storage.get_item(keys::ACCESS_TOKEN).unwrap().as_deref(), Some("a"));

        storage
            .write_items(&[(keys::ACCESS_TOKEN, None), (keys::USER, Some("{}"))])
            .unwrap();
        assert_eq!(storage.get_item(keys::ACCESS_TOKEN).unwrap(), None);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("session.json");

        let storage = FileStorage::open(&path).unwrap();
        storage
            .write_items(&[
                (keys::ACCESS_TOKEN, Some("a")),
                (keys::REFRESH_TOKEN, Some("r")),
            ])
            .unwrap();
        assert!(path.exists());

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("r"));
    }

    #[test]
    fn test_file_storage_removes_file_when_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item(keys::ACCESS_TOKEN, "a").unwrap();
        storage.remove_item(keys::ACCESS_TOKEN).unwrap();
        assert!(!path.exists());

        // Removing again is fine.
        storage.remove_item(keys::ACCESS_TOKEN).unwrap();
    }

    #[test]
    fn test_file_storage_discards_garbage() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get_item(keys::ACCESS_TOKEN).unwrap(), None);

        storage.set_item(keys::ACCESS_TOKEN, "a1").unwrap();
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get_item(keys::ACCESS_TOKEN).unwrap().as_deref(),
            Some("a1")
        );
    }
}
