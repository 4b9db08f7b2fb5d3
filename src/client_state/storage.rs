use std::{
    collections::HashMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::RwLock,
};

use anyhow::Context;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StateStorageError {
    #[error("Invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String key/value storage with the semantics of browser local storage.
pub trait StateStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StateStorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StateStorageError>;

    /// Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StateStorageError>;
}

/// One file per key inside `dir`. Writes go through a temporary file that
/// is renamed into place, so readers never observe a partial value.
pub struct FileStateStorage {
    dir: PathBuf,
}

impl FileStateStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {:?}", dir))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StateStorageError> {
        if key.is_empty() {
            return Err(StateStorageError::InvalidKey(key.to_string()));
        }
        Ok(self
            .dir
            .join(format!("{}.json", urlencoding::encode(key))))
    }
}

impl StateStorage for FileStateStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StateStorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StateStorageError> {
        let path = self.path_for(key)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!("Stored {} bytes under {}", value.len(), key);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StateStorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process memory only, lost on restart.
#[derive(Default)]
pub struct MemoryStateStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStateStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StateStorageError> {
        Ok(self.items.read().unwrap().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StateStorageError> {
        if key.is_empty() {
            return Err(StateStorageError::InvalidKey(key.to_string()));
        }
        self.items
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StateStorageError> {
        self.items.write().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(storage: &dyn StateStorage) {
        assert_eq!(storage.get_item("mboga-cart:1").unwrap(), None);

        storage.set_item("mboga-cart:1", "{\"items\":[]}").unwrap();
        assert_eq!(
            storage.get_item("mboga-cart:1").unwrap().as_deref(),
            Some("{\"items\":[]}")
        );

        storage.set_item("mboga-cart:1", "{}").unwrap();
        assert_eq!(storage.get_item("mboga-cart:1").unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.get_item("mboga-cart:2").unwrap(), None);

        storage.remove_item("mboga-cart:1").unwrap();
        assert_eq!(storage.get_item("mboga-cart:1").unwrap(), None);
        storage.remove_item("mboga-cart:1").unwrap();

        assert!(matches!(
            storage.set_item("", "x"),
            Err(StateStorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn memory_storage_semantics() {
        exercise(&MemoryStateStorage::new());
    }

    #[test]
    fn file_storage_semantics() {
        let dir = TempDir::new().unwrap();
        exercise(&FileStateStorage::new(dir.path().join("state")).unwrap());
    }

    #[test]
    fn file_storage_survives_reopen_and_escapes_keys() {
        let dir = TempDir::new().unwrap();
        {
            let storage = FileStateStorage::new(dir.path()).unwrap();
            storage.set_item("../escape/attempt", "42").unwrap();
        }
        let storage = FileStateStorage::new(dir.path()).unwrap();
        assert_eq!(
            storage.get_item("../escape/attempt").unwrap().as_deref(),
            Some("42")
        );
        // Stays inside the directory
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
