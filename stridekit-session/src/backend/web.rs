//! Browser persistent backend.
//!
//! Backed by `window.localStorage`. Availability is resolved per call: in
//! private browsing or sandboxed contexts the storage object may exist but
//! reject writes, which the startup probe turns into a volatile-mode
//! selection with a descriptive error.

use web_sys::Storage;

use crate::error::{SessionResult, SessionStoreError};

use super::StorageBackend;

/// `localStorage`-backed store for web targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebStorageBackend;

impl WebStorageBackend {
    /// Creates the backend. Storage availability is checked on first use,
    /// not here, so construction never fails.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn storage() -> SessionResult<Storage> {
        let window = web_sys::window()
            .ok_or_else(|| SessionStoreError::WebStore("no window object".to_string()))?;
        window
            .local_storage()
            .map_err(|err| SessionStoreError::WebStore(format!("localStorage access: {err:?}")))?
            .ok_or_else(|| SessionStoreError::WebStore("localStorage disabled".to_string()))
    }
}

impl StorageBackend for WebStorageBackend {
    fn label(&self) -> &'static str {
        "web-storage"
    }

    fn get(&self, record: &str) -> SessionResult<Option<String>> {
        Self::storage()?
            .get_item(record)
            .map_err(|err| SessionStoreError::WebStore(format!("read {record}: {err:?}")))
    }

    fn set(&self, record: &str, value: &str) -> SessionResult<()> {
        Self::storage()?
            .set_item(record, value)
            .map_err(|err| SessionStoreError::WebStore(format!("write {record}: {err:?}")))
    }

    fn remove(&self, record: &str) -> SessionResult<()> {
        Self::storage()?
            .remove_item(record)
            .map_err(|err| SessionStoreError::WebStore(format!("delete {record}: {err:?}")))
    }
}
