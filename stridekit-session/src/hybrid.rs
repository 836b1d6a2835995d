//! Key/payload splitter for hybrid-encrypted mode.
//!
//! Each entry's encryption key lives in the keychain-class store and its
//! ciphertext envelope in the general-purpose store, decoupling the OS
//! encryption guarantee from the keychain's per-item size ceiling.
//!
//! Write ordering invariant: the payload is written before the key record.
//! A crash between the two writes leaves an orphaned payload, which is
//! harmless and cleanable; it can never leave a key record pointing at a
//! payload that was never durably written.

use std::sync::Arc;

use tracing::warn;

use crate::backend::StorageBackend;
use crate::cipher::{self, EntryKey};
use crate::error::SessionResult;
use crate::names::RecordNames;

/// Strategy for hybrid-encrypted entries, bound to the two persistent
/// backends selected at negotiation time.
pub(crate) struct HybridStore {
    secure: Arc<dyn StorageBackend>,
    general: Arc<dyn StorageBackend>,
}

impl HybridStore {
    pub(crate) fn new(secure: Arc<dyn StorageBackend>, general: Arc<dyn StorageBackend>) -> Self {
        Self { secure, general }
    }

    /// Encrypts and stores a value, replacing any previous entry wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation, encryption, or either backend
    /// write fails. The caller (the facade) feeds failures to the demotion
    /// controller rather than surfacing them.
    pub(crate) fn set(&self, logical_key: &str, value: &str) -> SessionResult<()> {
        let entry_key = EntryKey::generate()?;
        let envelope = cipher::encrypt(value, &entry_key)?;
        let names = RecordNames::derive(logical_key);

        // Payload first; the key record must never exist without it.
        self.general.set(&names.payload_record, &envelope)?;
        self.secure.set(&names.key_record, &entry_key.to_encoded())?;
        Ok(())
    }

    /// Reads and decrypts an entry.
    ///
    /// An absent key record means the entry does not exist; no payload
    /// lookup happens. A key record without its payload is an orphan: it is
    /// best-effort deleted and the entry reported absent.
    ///
    /// # Errors
    ///
    /// Returns an error on backend read failures or decrypt failures; the
    /// facade treats both as "entry absent".
    pub(crate) fn get(&self, logical_key: &str) -> SessionResult<Option<String>> {
        let names = RecordNames::derive(logical_key);

        let Some(encoded_key) = self.secure.get(&names.key_record)? else {
            return Ok(None);
        };
        let Some(envelope) = self.general.get(&names.payload_record)? else {
            warn!(
                backend = self.general.label(),
                "orphaned key record without payload; cleaning up"
            );
            if let Err(err) = self.secure.remove(&names.key_record) {
                warn!(%err, "failed to delete orphaned key record");
            }
            return Ok(None);
        };

        let entry_key = EntryKey::from_encoded(&encoded_key)?;
        cipher::decrypt(&envelope, &entry_key).map(Some)
    }

    /// Deletes both records independently and best-effort. Removal is
    /// advisory: failures are logged, never propagated.
    pub(crate) fn remove(&self, logical_key: &str) {
        let names = RecordNames::derive(logical_key);
        if let Err(err) = self.secure.remove(&names.key_record) {
            warn!(%err, "failed to delete key record");
        }
        if let Err(err) = self.general.remove(&names.payload_record) {
            warn!(%err, "failed to delete payload record");
        }
    }

    /// Best-effort cleanup of both records, used by the demotion controller
    /// after rewriting an entry in plaintext.
    pub(crate) fn remove_artifacts(&self, logical_key: &str) {
        self.remove(logical_key);
    }
}
