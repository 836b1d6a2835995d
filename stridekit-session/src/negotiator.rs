//! Capability negotiation and live status ownership.
//!
//! One negotiator instance owns the backend set, the readiness cell, the
//! live status and the subscriber registry. It is injected into the facade
//! and the demotion controller rather than living in ambient globals, so
//! tests construct isolated instances freely.

use std::sync::RwLock;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::backend::BackendSet;
use crate::probe::run_probe;
use crate::status::{StatusListener, StorageMode, StorageStatus, SubscriberId, SubscriberRegistry};

/// Selects a storage mode once at startup and publishes readiness.
///
/// Initialization is a single forward pass with no re-entry: concurrent
/// callers of [`Self::initialize`] await the same in-flight pass, and the
/// probe results are memoized for the process lifetime. Mode changes after
/// initialization happen only through runtime demotion.
pub(crate) struct CapabilityNegotiator {
    backends: BackendSet,
    ready: OnceCell<StorageStatus>,
    current: RwLock<Option<StorageStatus>>,
    subscribers: SubscriberRegistry,
}

impl CapabilityNegotiator {
    pub(crate) fn new(backends: BackendSet) -> Self {
        Self {
            backends,
            ready: OnceCell::new(),
            current: RwLock::new(None),
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Runs probes and selects a mode, exactly once per instance.
    ///
    /// Never fails: any unusable backend is absorbed into a weaker mode and
    /// the final fallback is the always-available volatile map. Returns the
    /// current status snapshot, which reflects later demotions on repeat
    /// calls.
    pub(crate) async fn initialize(&self) -> StorageStatus {
        self.ready
            .get_or_init(|| async {
                let status = self.select_mode().await;
                debug!(mode = %status.mode, "storage mode selected");
                if let Ok(mut current) = self.current.write() {
                    *current = Some(status.clone());
                }
                self.subscribers.notify(&status);
                status
            })
            .await;
        self.status().unwrap_or_else(|| {
            // Unreachable once the cell is set; volatile is the safe answer.
            StorageStatus::with_error(StorageMode::Volatile, "status lock poisoned")
        })
    }

    /// Synchronous status snapshot; `None` before initialization resolves.
    pub(crate) fn status(&self) -> Option<StorageStatus> {
        self.current.read().ok().and_then(|current| current.clone())
    }

    /// The active mode; `None` before initialization resolves.
    #[allow(dead_code)]
    pub(crate) fn mode(&self) -> Option<StorageMode> {
        self.status().map(|status| status.mode)
    }

    /// Registers a status listener. When a status already exists the
    /// listener is immediately invoked once with it; either way it fires on
    /// every subsequent mode change.
    pub(crate) fn subscribe(&self, listener: StatusListener) -> SubscriberId {
        let id = self.subscribers.add(listener);
        if let Some(status) = self.status() {
            self.subscribers.notify_one(id, &status);
        }
        id
    }

    /// Removes a previously registered listener.
    pub(crate) fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.remove(id);
    }

    /// Flips the live status after a runtime demotion and notifies
    /// subscribers synchronously. One-directional: callers only ever pass a
    /// weaker mode than the current one.
    pub(crate) fn transition(&self, status: StorageStatus) {
        match self.current.write() {
            Ok(mut current) => *current = Some(status.clone()),
            Err(_) => {
                warn!("status lock poisoned during demotion");
                return;
            }
        }
        self.subscribers.notify(&status);
    }

    async fn select_mode(&self) -> StorageStatus {
        // Web target: the browser store is the only persistent candidate.
        if let Some(web) = &self.backends.web {
            return match run_probe(web.as_ref()) {
                Ok(()) => StorageStatus::healthy(StorageMode::WebPersistent),
                Err(err) => {
                    warn!(%err, "web storage unusable, falling back to volatile");
                    StorageStatus::with_error(
                        StorageMode::Volatile,
                        format!("web storage unusable: {err}"),
                    )
                }
            };
        }

        // Native target: probe both persistent stores concurrently.
        let secure_probe = async {
            match &self.backends.secure {
                Some(backend) => run_probe(backend.as_ref()).map_err(|err| err.to_string()),
                None => Err("keychain store not configured".to_string()),
            }
        };
        let general_probe = async {
            match &self.backends.general {
                Some(backend) => run_probe(backend.as_ref()).map_err(|err| err.to_string()),
                None => Err("general store not configured".to_string()),
            }
        };
        let (secure, general) = tokio::join!(secure_probe, general_probe);

        match (secure, general) {
            (Ok(()), Ok(())) => StorageStatus::healthy(StorageMode::HybridEncrypted),
            (Err(secure_err), Ok(())) => {
                warn!(%secure_err, "keychain unusable, selecting plain-persistent");
                StorageStatus::with_error(
                    StorageMode::PlainPersistent,
                    format!("keychain probe failed: {secure_err}"),
                )
            }
            (Ok(()), Err(general_err)) => {
                warn!(%general_err, "general store unusable, selecting volatile");
                StorageStatus::with_error(
                    StorageMode::Volatile,
                    format!("all persistent storage unavailable: general store: {general_err}"),
                )
            }
            (Err(secure_err), Err(general_err)) => {
                warn!(%secure_err, %general_err, "no persistent storage available");
                StorageStatus::with_error(
                    StorageMode::Volatile,
                    format!(
                        "all persistent storage unavailable: keychain: {secure_err}; general store: {general_err}"
                    ),
                )
            }
        }
    }
}
