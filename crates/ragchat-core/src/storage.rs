//! Key/value persistence for preferences and chat history.
//!
//! Every value is a JSON document stored under a named key, the same model a
//! browser's local storage offers. [`FileStore`] keeps one file per key;
//! [`MemoryStore`] keeps nothing past the process.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage keys used by the client
pub mod keys {
    pub const THEME: &str = "theme";
    pub const CHAT_HISTORY: &str = "chatHistory";
    pub const SAVE_TO_MEMORY: &str = "saveToMemory";
    pub const PERSONALIZATION: &str = "personalization";
    pub const SELECTED_MODEL: &str = "selectedModel";
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_raw(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a value. Missing keys and undecodable blobs both come back
/// as `None`; the latter is logged.
pub fn read<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get_raw(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read stored value");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring unparseable stored value");
            None
        }
    }
}

pub fn write<T: Serialize + ?Sized>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set_raw(key, &raw)
}

/// One `<key>.json` file per key inside a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// `~/.local/share/ragchat` (or the platform equivalent)
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("ragchat"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set_raw(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set_raw(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path()).unwrap();

        write(&mut store, keys::SELECTED_MODEL, "llama3.2:latest").unwrap();
        let model: Option<String> = read(&store, keys::SELECTED_MODEL);
        assert_eq!(model.as_deref(), Some("llama3.2:latest"));
        assert!(dir.path().join("selectedModel.json").exists());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = FileStore::new(dir.path()).unwrap();
            write(&mut store, keys::SAVE_TO_MEMORY, &false).unwrap();
        }
        let store = FileStore::new(dir.path()).unwrap();
        assert_eq!(read::<bool>(&store, keys::SAVE_TO_MEMORY), Some(false));
    }

    #[test]
    fn test_missing_and_corrupt_values_read_as_none() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path()).unwrap();
        assert_eq!(read::<bool>(&store, keys::THEME), None);

        store.set_raw(keys::THEME, "{not json").unwrap();
        assert_eq!(read::<String>(&store, keys::THEME), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path()).unwrap();
        write(&mut store, keys::CHAT_HISTORY, &Vec::<String>::new()).unwrap();
        store.remove(keys::CHAT_HISTORY).unwrap();
        store.remove(keys::CHAT_HISTORY).unwrap();
        assert_eq!(store.get_raw(keys::CHAT_HISTORY).unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.set_raw("../escape", "1"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        write(&mut store, keys::THEME, "light").unwrap();
        assert_eq!(read::<String>(&store, keys::THEME).as_deref(), Some("light"));
        store.remove(keys::THEME).unwrap();
        assert_eq!(read::<String>(&store, keys::THEME), None);
    }
}
