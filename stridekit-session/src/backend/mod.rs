//! Backend strategy interfaces for session storage.
//!
//! Each backing store implements one small trait; the capability negotiator
//! selects among them once at startup and the facade dispatches through the
//! selected strategy, never branching on a mode tag at call sites.
//!
//! Backends available per target:
//!
//! - [`KeychainBackend`] — OS keychain, encrypted at rest, ~2 KiB per item
//!   (native only)
//! - [`FileBackend`] — general-purpose file-per-record store, unbounded item
//!   size, no OS encryption (native only)
//! - [`WebStorageBackend`] — browser `localStorage` (wasm32 only)
//! - [`MemoryBackend`] — in-process volatile map, always usable

#[cfg(not(target_arch = "wasm32"))]
mod file;
#[cfg(not(target_arch = "wasm32"))]
mod keychain;
mod memory;
#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileBackend;
#[cfg(not(target_arch = "wasm32"))]
pub use keychain::KeychainBackend;
pub use memory::MemoryBackend;
#[cfg(target_arch = "wasm32")]
pub use web::WebStorageBackend;

use std::sync::Arc;

use crate::error::SessionResult;

/// A single backing store for string records.
///
/// Implementations are synchronous and `Send + Sync`; the async facade owns
/// the suspension points. Record names are derived internally (see the
/// `names` module) and never contain caller data verbatim in hybrid mode.
pub trait StorageBackend: Send + Sync {
    /// Short backend label used in probe errors and logs.
    fn label(&self) -> &'static str;

    /// Reads a record, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying store cannot be read.
    fn get(&self, record: &str) -> SessionResult<Option<String>>;

    /// Writes a record, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns an error when the write is rejected or fails.
    fn set(&self, record: &str, value: &str) -> SessionResult<()>;

    /// Deletes a record. Deleting an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only for actual store failures.
    fn remove(&self, record: &str) -> SessionResult<()>;
}

/// The set of backends a store instance negotiates over.
///
/// Tests construct arbitrary sets (including injected fault-injecting
/// doubles); production code uses the target's default wiring.
#[derive(Clone)]
pub struct BackendSet {
    /// Keychain-class store: OS-encrypted, tiny per-item capacity.
    pub secure: Option<Arc<dyn StorageBackend>>,
    /// General-purpose persistent store: unbounded items, no OS encryption.
    pub general: Option<Arc<dyn StorageBackend>>,
    /// Browser persistent store. Present only on web targets.
    pub web: Option<Arc<dyn StorageBackend>>,
    /// In-process volatile map; last resort and overflow for failed writes.
    pub volatile: Arc<MemoryBackend>,
}

impl BackendSet {
    /// Set for a native target with both persistent stores.
    #[must_use]
    pub fn native(secure: Arc<dyn StorageBackend>, general: Arc<dyn StorageBackend>) -> Self {
        Self {
            secure: Some(secure),
            general: Some(general),
            web: None,
            volatile: Arc::new(MemoryBackend::new()),
        }
    }

    /// Set for a web target.
    #[must_use]
    pub fn web(web: Arc<dyn StorageBackend>) -> Self {
        Self {
            secure: None,
            general: None,
            web: Some(web),
            volatile: Arc::new(MemoryBackend::new()),
        }
    }

    /// Set with no persistent backend at all. The negotiator will land in
    /// volatile mode.
    #[must_use]
    pub fn volatile_only() -> Self {
        Self {
            secure: None,
            general: None,
            web: None,
            volatile: Arc::new(MemoryBackend::new()),
        }
    }
}
