//! In-process volatile backend.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{SessionResult, SessionStoreError};

use super::StorageBackend;

/// Volatile map backend.
///
/// Always usable, lost on process exit. Serves two roles: the last-resort
/// storage mode, and the overflow map that holds values whose persistent
/// write failed so the caller's in-memory state stays consistent.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates an empty volatile backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the map lock is poisoned.
    pub fn len(&self) -> SessionResult<usize> {
        Ok(self.read()?.len())
    }

    /// Returns `true` when no entries are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the map lock is poisoned.
    pub fn is_empty(&self) -> SessionResult<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Snapshot of all entries, used when demotion flushes the overflow map
    /// into a persistent store.
    ///
    /// # Errors
    ///
    /// Returns an error if the map lock is poisoned.
    pub fn entries(&self) -> SessionResult<Vec<(String, String)>> {
        Ok(self
            .read()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Removes all entries.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    fn read(&self) -> SessionResult<std::sync::RwLockReadGuard<'_, HashMap<String, String>>> {
        self.entries
            .read()
            .map_err(|_| SessionStoreError::Internal("volatile map lock poisoned".to_string()))
    }

    fn write(&self) -> SessionResult<std::sync::RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.entries
            .write()
            .map_err(|_| SessionStoreError::Internal("volatile map lock poisoned".to_string()))
    }
}

impl StorageBackend for MemoryBackend {
    fn label(&self) -> &'static str {
        "volatile"
    }

    fn get(&self, record: &str) -> SessionResult<Option<String>> {
        Ok(self.read()?.get(record).cloned())
    }

    fn set(&self, record: &str, value: &str) -> SessionResult<()> {
        self.write()?.insert(record.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, record: &str) -> SessionResult<()> {
        self.write()?.remove(record);
        Ok(())
    }
}
