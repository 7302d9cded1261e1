//! Durable string key-value storage.
//!
//! File backend: one `<key>.json` file per key under the data directory
//! (default ~/.pawmap). Writes replace the whole value.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

/// A string-to-string store with whole-value writes.
pub trait KeyValueStorage: Send + Sync {
    /// `None` when the key was never written or cannot be read.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ─── File backend ───────────────────────────────────────────────

pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at a specific directory.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pawmap")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key).ok()?;
        fs::read_to_string(path).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        // Readers never observe a partially written value.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|source| StorageError::Io { path, source })
    }
}

// ─── In-memory backend ──────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a raw value (for testing).
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage.entries_mut().insert(key.to_string(), value.to_string());
        storage
    }

    fn entries_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries_mut().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (FileStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        (FileStorage::open(dir.path().join("data")), dir)
    }

    #[test]
    fn test_file_set_get() {
        let (storage, _dir) = test_storage();
        storage.set("pawmapSavedLocations", "[]").unwrap();
        assert_eq!(storage.get("pawmapSavedLocations").as_deref(), Some("[]"));
        assert!(storage.dir().join("pawmapSavedLocations.json").exists());
    }

    #[test]
    fn test_file_missing_key() {
        let (storage, _dir) = test_storage();
        assert!(storage.get("nothing").is_none());
    }

    #[test]
    fn test_file_overwrite() {
        let (storage, _dir) = test_storage();
        storage.set("k", "[1]").unwrap();
        storage.set("k", "[1,2]").unwrap();
        assert_eq!(storage.get("k").as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_file_persistence() {
        let dir = TempDir::new().unwrap();
        {
            let storage = FileStorage::open(dir.path());
            storage.set("pawmapPets", r#"[{"id":1}]"#).unwrap();
        }
        let reopened = FileStorage::open(dir.path());
        assert_eq!(reopened.get("pawmapPets").as_deref(), Some(r#"[{"id":1}]"#));
    }

    #[test]
    fn test_file_rejects_path_like_keys() {
        let (storage, _dir) = test_storage();
        assert!(matches!(storage.set("../escape", "x"), Err(StorageError::InvalidKey(_))));
        assert!(storage.get("../escape").is_none());
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_entry("a", "1");
        assert_eq!(storage.get("a").as_deref(), Some("1"));
        storage.set("a", "2").unwrap();
        assert_eq!(storage.get("a").as_deref(), Some("2"));
        assert!(storage.get("b").is_none());
    }
}
