//! The public session store facade.
//!
//! `SessionStore` is the only surface the rest of the application touches.
//! Every operation awaits capability negotiation before touching a backend,
//! dispatches through the strategy selected for the current mode, and never
//! surfaces a storage fault to the caller: reads collapse to absent, writes
//! exhaust the demotion path and finally land in the volatile map.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::backend::{BackendSet, StorageBackend};
use crate::demotion::DemotionController;
use crate::error::SessionResult;
use crate::hybrid::HybridStore;
use crate::migration::{LegacyMigrator, DEFAULT_LEGACY_PREFIXES};
use crate::names;
use crate::negotiator::CapabilityNegotiator;
use crate::status::{StorageMode, StorageStatus, SubscriberId};

#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

#[cfg(not(target_arch = "wasm32"))]
use crate::backend::{FileBackend, KeychainBackend};
#[cfg(target_arch = "wasm32")]
use crate::backend::WebStorageBackend;

/// Configuration for the default native backend wiring.
#[cfg(not(target_arch = "wasm32"))]
pub struct SessionStoreConfig {
    service: String,
    data_dir: PathBuf,
    legacy_prefixes: Vec<String>,
}

#[cfg(not(target_arch = "wasm32"))]
impl SessionStoreConfig {
    /// Creates a configuration with the default legacy key prefixes.
    ///
    /// `service` scopes keychain items; `data_dir` roots the general store.
    pub fn new(service: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            service: service.into(),
            data_dir: data_dir.into(),
            legacy_prefixes: DEFAULT_LEGACY_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Replaces the legacy key prefixes recognized by the migrator.
    #[must_use]
    pub fn with_legacy_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.legacy_prefixes = prefixes;
        self
    }
}

/// Resilient encrypted key-value store for session material.
///
/// Cheap to clone; clones share the same negotiated state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backends: BackendSet,
    negotiator: CapabilityNegotiator,
    demotion: DemotionController,
    migration: LegacyMigrator,
    hybrid: Option<HybridStore>,
}

impl SessionStore {
    /// Opens a store with the default native backends: the OS keychain and
    /// a file-per-record general store under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the general store directory cannot be created.
    /// Backend *usability* is not checked here; that is the probes' job
    /// during [`Self::initialize`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn open(config: SessionStoreConfig) -> SessionResult<Self> {
        let general = FileBackend::new(&config.data_dir)?;
        let secure = KeychainBackend::new(config.service);
        Ok(Self::with_backends(
            BackendSet::native(Arc::new(secure), Arc::new(general)),
            config.legacy_prefixes,
        ))
    }

    /// Opens a store backed by browser `localStorage`.
    #[cfg(target_arch = "wasm32")]
    #[must_use]
    pub fn open_web() -> Self {
        Self::with_backends(
            BackendSet::web(Arc::new(WebStorageBackend::new())),
            Vec::new(),
        )
    }

    /// Builds a store over an arbitrary backend set.
    ///
    /// This is the dependency-injection seam: tests construct isolated
    /// instances with in-memory or fault-injecting backends instead of
    /// relying on process-wide reset hooks.
    #[must_use]
    pub fn with_backends(backends: BackendSet, legacy_prefixes: Vec<String>) -> Self {
        let hybrid = match (&backends.secure, &backends.general) {
            (Some(secure), Some(general)) => {
                Some(HybridStore::new(secure.clone(), general.clone()))
            }
            _ => None,
        };
        Self {
            inner: Arc::new(StoreInner {
                negotiator: CapabilityNegotiator::new(backends.clone()),
                demotion: DemotionController::new(),
                migration: LegacyMigrator::new(legacy_prefixes),
                hybrid,
                backends,
            }),
        }
    }

    /// Runs capability probes and selects a storage mode, once. Safe to
    /// race; concurrent callers await the same pass. Every storage
    /// operation also awaits this implicitly, so calling it up front is
    /// optional but gives the host control over startup ordering.
    pub async fn initialize(&self) -> StorageStatus {
        self.inner.negotiator.initialize().await
    }

    /// Synchronous status snapshot; `None` until initialization resolves.
    #[must_use]
    pub fn status(&self) -> Option<StorageStatus> {
        self.inner.negotiator.status()
    }

    /// Registers a status listener. It is invoked immediately with the
    /// current status once one exists, then again on every mode change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StorageStatus) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.inner.negotiator.subscribe(Box::new(listener))
    }

    /// Removes a listener registered with [`Self::subscribe`].
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.negotiator.unsubscribe(id);
    }

    /// Returns the pluggable-storage adapter handed to the session SDK.
    #[must_use]
    pub fn adapter(&self) -> SessionStorageAdapter {
        SessionStorageAdapter {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Reads a value. Backend errors, decrypt failures and inconsistent
    /// entries all read as `None`; this call never fails.
    pub async fn get_item(&self, key: &str) -> Option<String> {
        let status = self.inner.negotiator.initialize().await;
        self.inner.get_in_mode(status.mode, key)
    }

    /// Writes a value. Never fails: on persistent-backend failure the
    /// demotion path runs and, failing that, the value lands in the
    /// volatile map so in-memory state stays consistent.
    pub async fn set_item(&self, key: &str, value: &str) {
        let status = self.inner.negotiator.initialize().await;
        self.inner.set_in_mode(status.mode, key, value);
    }

    /// Removes a value from every backend it may live in. Never fails;
    /// removal is advisory and failures are logged.
    pub async fn remove_item(&self, key: &str) {
        let status = self.inner.negotiator.initialize().await;
        self.inner.remove_in_mode(status.mode, key);
    }
}

impl StoreInner {
    fn get_in_mode(&self, mode: StorageMode, key: &str) -> Option<String> {
        if mode == StorageMode::Volatile {
            return read_or_absent(self.backends.volatile.get(key));
        }

        // A failed persist leaves the newest value in the overflow map.
        if let Some(value) = read_or_absent(self.backends.volatile.get(key)) {
            return Some(value);
        }

        let fetched = match mode {
            StorageMode::HybridEncrypted => self.hybrid.as_ref().and_then(|hybrid| {
                hybrid.get(key).unwrap_or_else(|err| {
                    warn!(%err, "hybrid read failed; treating entry as absent");
                    None
                })
            }),
            StorageMode::PlainPersistent => self
                .backends
                .general
                .as_ref()
                .and_then(|general| read_or_absent(general.get(&names::plain_record(key)))),
            StorageMode::WebPersistent => self
                .backends
                .web
                .as_ref()
                .and_then(|web| read_or_absent(web.get(key))),
            StorageMode::Volatile => None,
        };
        if fetched.is_some() {
            return fetched;
        }

        // Native persistent modes: one-shot legacy migration on first miss.
        if matches!(
            mode,
            StorageMode::HybridEncrypted | StorageMode::PlainPersistent
        ) {
            if let Some(value) = self.migration.recover(key, &self.backends) {
                self.set_in_mode(mode, key, &value);
                return Some(value);
            }
        }
        None
    }

    fn set_in_mode(&self, mode: StorageMode, key: &str, value: &str) {
        match mode {
            StorageMode::HybridEncrypted => {
                let Some(hybrid) = &self.hybrid else {
                    // Unreachable: hybrid mode is only selected when both
                    // backends exist. Keep the caller's state consistent.
                    let _ = self.backends.volatile.set(key, value);
                    return;
                };
                match hybrid.set(key, value) {
                    Ok(()) => self.after_successful_set(key),
                    Err(err) => self.demotion.handle_set_failure(
                        &self.backends,
                        &self.negotiator,
                        self.hybrid.as_ref(),
                        key,
                        value,
                        &err,
                    ),
                }
            }
            StorageMode::PlainPersistent => {
                let result = self
                    .backends
                    .general
                    .as_ref()
                    .map(|general| general.set(&names::plain_record(key), value));
                self.settle_plain_write(result, key, value);
            }
            StorageMode::WebPersistent => {
                let result = self
                    .backends
                    .web
                    .as_ref()
                    .map(|web| web.set(key, value));
                self.settle_plain_write(result, key, value);
            }
            StorageMode::Volatile => {
                if let Err(err) = self.backends.volatile.set(key, value) {
                    warn!(%err, "volatile write failed");
                }
            }
        }
    }

    /// Resolves an unencrypted persistent write: clear the overflow entry on
    /// success, fall back to the volatile map on failure.
    fn settle_plain_write(&self, result: Option<SessionResult<()>>, key: &str, value: &str) {
        match result {
            Some(Ok(())) => self.after_successful_set(key),
            Some(Err(err)) => {
                warn!(%err, "persistent write failed; value kept in volatile map");
                let _ = self.backends.volatile.set(key, value);
            }
            None => {
                let _ = self.backends.volatile.set(key, value);
            }
        }
    }

    fn after_successful_set(&self, key: &str) {
        self.demotion.record_success();
        if let Err(err) = self.backends.volatile.remove(key) {
            warn!(%err, "overflow cleanup failed");
        }
    }

    fn remove_in_mode(&self, mode: StorageMode, key: &str) {
        if let Err(err) = self.backends.volatile.remove(key) {
            warn!(%err, "volatile remove failed");
        }
        match mode {
            StorageMode::HybridEncrypted => {
                if let Some(hybrid) = &self.hybrid {
                    hybrid.remove(key);
                }
            }
            StorageMode::PlainPersistent => {
                if let Some(general) = &self.backends.general {
                    if let Err(err) = general.remove(&names::plain_record(key)) {
                        warn!(%err, "general store remove failed");
                    }
                }
                // Entries written before a demotion may still have
                // encrypted artifacts; clear those too.
                if let Some(hybrid) = &self.hybrid {
                    hybrid.remove(key);
                }
            }
            StorageMode::WebPersistent => {
                if let Some(web) = &self.backends.web {
                    if let Err(err) = web.remove(key) {
                        warn!(%err, "web store remove failed");
                    }
                }
            }
            StorageMode::Volatile => {}
        }
        if matches!(
            mode,
            StorageMode::HybridEncrypted | StorageMode::PlainPersistent
        ) {
            self.migration.purge(key, &self.backends);
        }
    }
}

fn read_or_absent(result: SessionResult<Option<String>>) -> Option<String> {
    result.unwrap_or_else(|err| {
        warn!(%err, "backend read failed; treating entry as absent");
        None
    })
}

/// The pluggable-storage contract expected by the session-management SDK.
///
/// The SDK persists opaque session strings through this trait and is this
/// store's only consumer.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Reads a stored value, `None` when absent or unreadable.
    async fn get_item(&self, key: &str) -> Option<String>;

    /// Stores a value. Infallible from the caller's perspective.
    async fn set_item(&self, key: &str, value: &str);

    /// Removes a value. Infallible from the caller's perspective.
    async fn remove_item(&self, key: &str);
}

/// Adapter handed to the session SDK; delegates to the owning store.
#[derive(Clone)]
pub struct SessionStorageAdapter {
    inner: Arc<StoreInner>,
}

#[async_trait]
impl SessionStorage for SessionStorageAdapter {
    async fn get_item(&self, key: &str) -> Option<String> {
        let status = self.inner.negotiator.initialize().await;
        self.inner.get_in_mode(status.mode, key)
    }

    async fn set_item(&self, key: &str, value: &str) {
        let status = self.inner.negotiator.initialize().await;
        self.inner.set_in_mode(status.mode, key, value);
    }

    async fn remove_item(&self, key: &str) {
        let status = self.inner.negotiator.initialize().await;
        self.inner.remove_in_mode(status.mode, key);
    }
}
