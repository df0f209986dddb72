//! Key-value stores backing the local session cache.

use super::atomic_file::{AtomicFile, AtomicFileError, FileFormat};
use adaptiq_core::error::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Synchronous string-keyed JSON store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| adaptiq_core::AdaptiqError::internal(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| adaptiq_core::AdaptiqError::internal(e.to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| adaptiq_core::AdaptiqError::internal(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object in a file.
///
/// Every write is a locked read-modify-write, so several processes may share
/// the file.
pub struct FileKeyValueStore {
    file: AtomicFile<BTreeMap<String, Value>>,
}

impl FileKeyValueStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicFile::new(path, FileFormat::Json),
        }
    }

    /// Current contents; a file that cannot be parsed reads as empty and is
    /// replaced by the next write.
    fn entries(&self) -> Result<BTreeMap<String, Value>> {
        match self.file.load() {
            Ok(entries) => Ok(entries.unwrap_or_default()),
            Err(AtomicFileError::JsonError(e)) => {
                tracing::warn!("Ignoring unreadable cache {}: {}", self.file.path().display(), e);
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.file.update(BTreeMap::new(), |entries| {
            entries.insert(key.to_string(), value);
            Ok(())
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.file.path().exists() {
            return Ok(());
        }
        self.file.update(BTreeMap::new(), |entries| {
            entries.remove(key);
            Ok(())
        })?;
        Ok(())
    }
}
