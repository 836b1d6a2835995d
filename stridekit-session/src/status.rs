//! Storage mode and status reporting.
//!
//! The status snapshot is the one piece of this subsystem the host
//! application observes directly: which mode the store landed in, whether
//! entries are encrypted and persistent, and when (if ever) the store
//! degraded at runtime.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The storage mode the store is currently operating in.
///
/// Exactly one mode is active at any time. Transitions are one-directional
/// toward weaker modes; the store never promotes itself back to a stronger
/// mode within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// Per-entry encryption key in the OS keychain, encrypted payload in the
    /// general-purpose store.
    HybridEncrypted,
    /// Plaintext values in the general-purpose store. Selected when the
    /// keychain is unusable, or after runtime demotion.
    PlainPersistent,
    /// Browser persistent storage (web targets only).
    WebPersistent,
    /// In-process map. Always usable, lost on process exit.
    Volatile,
}

impl StorageMode {
    /// Whether values are encrypted at rest in this mode.
    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        matches!(self, Self::HybridEncrypted)
    }

    /// Whether values survive a process restart in this mode.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        !matches!(self, Self::Volatile)
    }

    /// Stable string form, matching the serialized representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HybridEncrypted => "hybrid-encrypted",
            Self::PlainPersistent => "plain-persistent",
            Self::WebPersistent => "web-persistent",
            Self::Volatile => "volatile",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of the store's condition.
///
/// Returned by value; callers never hold a reference into live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    /// The active storage mode.
    pub mode: StorageMode,
    /// Whether values are encrypted at rest.
    pub is_encrypted: bool,
    /// Whether values survive a process restart.
    pub is_persistent: bool,
    /// Human-readable description of why a weaker mode was selected, when
    /// the store is not in its strongest mode for the target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix timestamp of a runtime demotion, if one has happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_at: Option<u64>,
}

impl StorageStatus {
    /// Status for a mode selected cleanly at startup.
    #[must_use]
    pub fn healthy(mode: StorageMode) -> Self {
        Self {
            mode,
            is_encrypted: mode.is_encrypted(),
            is_persistent: mode.is_persistent(),
            error: None,
            degraded_at: None,
        }
    }

    /// Status for a mode selected because a stronger one was unusable.
    #[must_use]
    pub fn with_error(mode: StorageMode, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::healthy(mode)
        }
    }

    /// Status after a runtime demotion.
    #[must_use]
    pub fn demoted(mode: StorageMode, error: impl Into<String>, degraded_at: u64) -> Self {
        Self {
            degraded_at: Some(degraded_at),
            ..Self::with_error(mode, error)
        }
    }
}

/// Handle identifying a registered status listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

pub(crate) type StatusListener = Box<dyn Fn(&StorageStatus) + Send + Sync>;

/// Registry of status-change listeners.
///
/// A panicking listener is caught and logged; it never prevents other
/// listeners from being notified or a write operation from completing.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    listeners: Mutex<HashMap<u64, StatusListener>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, listener: StatusListener) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, listener);
        }
        SubscriberId(id)
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&id.0);
        }
    }

    /// Invokes every registered listener with `status`.
    pub(crate) fn notify(&self, status: &StorageStatus) {
        let Ok(listeners) = self.listeners.lock() else {
            warn!("subscriber registry lock poisoned; skipping notification");
            return;
        };
        for listener in listeners.values() {
            invoke(listener.as_ref(), status);
        }
    }

    /// Invokes a single listener, used for the initial call on subscribe.
    pub(crate) fn notify_one(&self, id: SubscriberId, status: &StorageStatus) {
        let Ok(listeners) = self.listeners.lock() else {
            return;
        };
        if let Some(listener) = listeners.get(&id.0) {
            invoke(listener.as_ref(), status);
        }
    }
}

fn invoke(listener: &(dyn Fn(&StorageStatus) + Send + Sync), status: &StorageStatus) {
    if catch_unwind(AssertUnwindSafe(|| listener(status))).is_err() {
        warn!(mode = %status.mode, "status listener panicked during notification");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_mode_predicates() {
        assert!(StorageMode::HybridEncrypted.is_encrypted());
        assert!(StorageMode::HybridEncrypted.is_persistent());
        assert!(!StorageMode::PlainPersistent.is_encrypted());
        assert!(StorageMode::PlainPersistent.is_persistent());
        assert!(StorageMode::WebPersistent.is_persistent());
        assert!(!StorageMode::Volatile.is_encrypted());
        assert!(!StorageMode::Volatile.is_persistent());
    }

    #[test]
    fn test_status_serialization_shape() {
        let status = StorageStatus::healthy(StorageMode::HybridEncrypted);
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["mode"], "hybrid-encrypted");
        assert_eq!(json["is_encrypted"], true);
        // Absent optionals are omitted entirely.
        assert!(json.get("error").is_none());
        assert!(json.get("degraded_at").is_none());

        let demoted =
            StorageStatus::demoted(StorageMode::PlainPersistent, "keychain write failed", 1_700_000_000);
        let json = serde_json::to_value(&demoted).expect("serialize");
        assert_eq!(json["degraded_at"], 1_700_000_000);
        assert_eq!(json["error"], "keychain write failed");
    }

    #[test]
    fn test_registry_notifies_all_listeners() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        registry.add(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&count);
        registry.add(Box::new(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(&StorageStatus::healthy(StorageMode::Volatile));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registry_isolates_panicking_listener() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        registry.add(Box::new(|_| panic!("listener bug")));
        let c = Arc::clone(&count);
        registry.add(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(&StorageStatus::healthy(StorageMode::Volatile));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_remove() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let id = registry.add(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        registry.remove(id);

        registry.notify(&StorageStatus::healthy(StorageMode::Volatile));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
