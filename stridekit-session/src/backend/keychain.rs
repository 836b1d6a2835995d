//! OS keychain backend.
//!
//! Backed by the platform credential store (Keychain Services on macOS/iOS,
//! the platform keystore elsewhere) through the `keyring` crate. Items are
//! encrypted at rest by the OS, but the store imposes a hard per-item size
//! ceiling, which is why hybrid mode keeps only 44-byte key records here.

use keyring::Entry;

use crate::error::{SessionResult, SessionStoreError};

use super::StorageBackend;

/// Hard per-item ceiling. Keychain implementations reject or truncate items
/// around this size; writes above it fail fast instead.
pub const KEYCHAIN_ITEM_LIMIT: usize = 2048;

/// Keychain-class backend storing records as service/account passwords.
pub struct KeychainBackend {
    service: String,
}

impl KeychainBackend {
    /// Creates a backend scoped to the given keychain service name.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, record: &str) -> SessionResult<Entry> {
        Entry::new(&self.service, record)
            .map_err(|err| SessionStoreError::Keychain(format!("keyring init: {err}")))
    }
}

impl StorageBackend for KeychainBackend {
    fn label(&self) -> &'static str {
        "keychain"
    }

    fn get(&self, record: &str) -> SessionResult<Option<String>> {
        match self.entry(record)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(SessionStoreError::Keychain(format!("read: {err}"))),
        }
    }

    fn set(&self, record: &str, value: &str) -> SessionResult<()> {
        if value.len() > KEYCHAIN_ITEM_LIMIT {
            return Err(SessionStoreError::ValueTooLarge {
                size: value.len(),
                limit: KEYCHAIN_ITEM_LIMIT,
            });
        }
        self.entry(record)?
            .set_password(value)
            .map_err(|err| SessionStoreError::Keychain(format!("write: {err}")))
    }

    fn remove(&self, record: &str) -> SessionResult<()> {
        match self.entry(record)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(SessionStoreError::Keychain(format!("delete: {err}"))),
        }
    }
}
