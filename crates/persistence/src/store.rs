//! Key-value storage.
//!
//! Values are opaque strings (JSON in practice). A successful `set` must be
//! visible to the very next `get`; recovery after a restart reads back
//! exactly what the last write stored.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::debug;

use crate::PersistenceError;

/// Key-value persistence used for alarm and region snapshots.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Replace the value stored under `key`. Either the whole value is
    /// stored or the previous value is left untouched.
    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Volatile store for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `set`/`remove` calls fail, to simulate a full disk.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(PersistenceError::Io("simulated write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Store that keeps one JSON file per key inside a directory.
///
/// Writes go to a temp file in the same directory which is then renamed
/// over the target, so a crash mid-write never leaves a truncated file.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let root = self.root.clone();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), PersistenceError> {
            let mut temp_file = NamedTempFile::new_in(&root)?;
            temp_file.write_all(value.as_bytes())?;
            temp_file.as_file().sync_all()?;
            temp_file.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| PersistenceError::Io(format!("write task failed: {e}")))?
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_read_after_write() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("alarms").await.unwrap(), None);

        store.set("alarms", "[1]").await.unwrap();
        assert_eq!(store.get("alarms").await.unwrap().as_deref(), Some("[1]"));

        store.set("alarms", "[2]").await.unwrap();
        assert_eq!(store.get("alarms").await.unwrap().as_deref(), Some("[2]"));

        store.remove("alarms").await.unwrap();
        assert_eq!(store.get("alarms").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_write_failure_keeps_old_value() {
        let store = InMemoryStore::new();
        store.set("alarms", "[1]").await.unwrap();

        store.set_fail_writes(true);
        assert!(store.set("alarms", "[2]").await.is_err());
        assert!(store.remove("alarms").await.is_err());
        assert_eq!(store.get("alarms").await.unwrap().as_deref(), Some("[1]"));

        store.set_fail_writes(false);
        store.set("alarms", "[2]").await.unwrap();
        assert_eq!(store.get("alarms").await.unwrap().as_deref(), Some("[2]"));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("data")).await.unwrap();

        assert_eq!(store.get("alarms.active").await.unwrap(), None);
        store.set("alarms.active", r#"[{"id":"a"}]"#).await.unwrap();
        assert_eq!(
            store.get("alarms.active").await.unwrap().as_deref(),
            Some(r#"[{"id":"a"}]"#)
        );
        assert!(dir.path().join("data/alarms.active.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.set("geofence.regions", "[]").await.unwrap();
        }
        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("geofence.regions").await.unwrap().as_deref(),
            Some("[]")
        );
    }

    #[tokio::test]
    async fn test_file_store_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.remove("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(
                matches!(store.get(key).await, Err(PersistenceError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }
}
