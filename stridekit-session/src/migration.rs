//! Lazy migration from the legacy single-store layout.
//!
//! Older app versions wrote session values in plaintext under the raw
//! logical key, either in the keychain (small values) or the general store.
//! On first read of such a key the value is re-persisted through the current
//! mode's write path and the legacy artifact deleted best-effort.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::backend::BackendSet;

/// Default legacy key prefixes recognized by the migrator.
pub const DEFAULT_LEGACY_PREFIXES: &[&str] = &["auth.", "session."];

/// Detects and recovers entries written in the legacy layout.
pub(crate) struct LegacyMigrator {
    prefixes: Vec<String>,
    /// Keys already checked this process; migration runs at most once per
    /// key per process.
    attempted: Mutex<HashSet<String>>,
}

impl LegacyMigrator {
    pub(crate) fn new(prefixes: Vec<String>) -> Self {
        Self {
            prefixes,
            attempted: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a logical key matches the legacy naming convention.
    pub(crate) fn is_candidate(&self, logical_key: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| logical_key.starts_with(prefix.as_str()))
    }

    /// Marks a key as checked and reports whether this was the first time.
    fn first_attempt(&self, logical_key: &str) -> bool {
        self.attempted
            .lock()
            .map(|mut attempted| attempted.insert(logical_key.to_string()))
            .unwrap_or(false)
    }

    /// Looks for a legacy artifact for `logical_key` and, if found, returns
    /// its value after deleting the artifact best-effort.
    ///
    /// Legacy locations are checked in priority order: keychain-class store
    /// first, then the general store. Returns `None` when the key is not a
    /// legacy candidate, was already checked this process, or has no legacy
    /// artifact.
    pub(crate) fn recover(&self, logical_key: &str, backends: &BackendSet) -> Option<String> {
        if !self.is_candidate(logical_key) || !self.first_attempt(logical_key) {
            return None;
        }

        let locations = [backends.secure.as_ref(), backends.general.as_ref()];
        for backend in locations.into_iter().flatten() {
            match backend.get(logical_key) {
                Ok(Some(value)) => {
                    debug!(
                        backend = backend.label(),
                        "migrating legacy entry to current layout"
                    );
                    // Deletion failure never blocks the migration.
                    if let Err(err) = backend.remove(logical_key) {
                        warn!(%err, "failed to delete legacy artifact");
                    }
                    return Some(value);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(%err, backend = backend.label(), "legacy lookup failed");
                }
            }
        }
        None
    }

    /// Best-effort removal of legacy artifacts, used by `remove_item` so a
    /// removed key cannot resurrect from the old layout.
    pub(crate) fn purge(&self, logical_key: &str, backends: &BackendSet) {
        if !self.is_candidate(logical_key) {
            return;
        }
        for backend in [backends.secure.as_ref(), backends.general.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Err(err) = backend.remove(logical_key) {
                warn!(%err, backend = backend.label(), "failed to purge legacy artifact");
            }
        }
    }
}
