//! Runtime demotion after repeated write failures.
//!
//! Write failures in hybrid-encrypted mode increment a process-wide
//! consecutive-failure counter. At the threshold the whole store demotes to
//! plain-persistent: the failing value and any volatile-overflow entries are
//! rewritten unencrypted in the general store, encrypted artifacts are
//! cleaned up best-effort, and subscribers are notified. Demotion is
//! one-directional and sticky for the process lifetime.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::backend::{BackendSet, StorageBackend};
use crate::error::SessionStoreError;
use crate::hybrid::HybridStore;
use crate::names;
use crate::negotiator::CapabilityNegotiator;
use crate::probe::run_probe;
use crate::status::{StorageMode, StorageStatus};

/// Consecutive write failures tolerated before demotion is attempted.
pub(crate) const DEMOTION_THRESHOLD: u32 = 2;

/// Tracks write failures and executes the demotion path.
pub(crate) struct DemotionController {
    consecutive_failures: AtomicU32,
}

impl DemotionController {
    pub(crate) const fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Resets the failure counter. Called on every successful `set_item`.
    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Handles a hybrid-mode write failure.
    ///
    /// Below the threshold, the value falls back to the volatile map so the
    /// caller's in-memory state stays consistent. At the threshold the
    /// general store is re-probed and, if usable, the store demotes to
    /// plain-persistent. Either way the calling `set_item` never fails.
    pub(crate) fn handle_set_failure(
        &self,
        backends: &BackendSet,
        negotiator: &CapabilityNegotiator,
        hybrid: Option<&HybridStore>,
        logical_key: &str,
        value: &str,
        cause: &SessionStoreError,
    ) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(%cause, failures, "hybrid write failed");

        if failures >= DEMOTION_THRESHOLD
            && self.try_demote(backends, negotiator, hybrid, logical_key, value, cause)
        {
            return;
        }

        // Demotion not attempted or not possible: keep the value in-process.
        if let Err(err) = backends.volatile.set(logical_key, value) {
            warn!(%err, "volatile fallback write failed");
        }
    }

    /// Attempts the demotion sequence. Returns `true` when the store flipped
    /// to plain-persistent and the value was persisted there.
    fn try_demote(
        &self,
        backends: &BackendSet,
        negotiator: &CapabilityNegotiator,
        hybrid: Option<&HybridStore>,
        logical_key: &str,
        value: &str,
        cause: &SessionStoreError,
    ) -> bool {
        let Some(general) = &backends.general else {
            return false;
        };
        if let Err(err) = run_probe(general.as_ref()) {
            warn!(%err, "general store re-probe failed; demotion aborted");
            return false;
        }
        if let Err(err) = general.set(&names::plain_record(logical_key), value) {
            warn!(%err, "plaintext rewrite failed; demotion aborted");
            return false;
        }
        if let Err(err) = backends.volatile.remove(logical_key) {
            warn!(%err, "volatile cleanup failed");
        }
        if let Some(hybrid) = hybrid {
            hybrid.remove_artifacts(logical_key);
        }

        // Flush entries that had already fallen back to the volatile map.
        match backends.volatile.entries() {
            Ok(entries) => {
                for (key, overflow_value) in entries {
                    match general.set(&names::plain_record(&key), &overflow_value) {
                        Ok(()) => {
                            if let Err(err) = backends.volatile.remove(&key) {
                                warn!(%err, "volatile cleanup failed");
                            }
                        }
                        Err(err) => warn!(%err, "failed to flush volatile entry"),
                    }
                }
            }
            Err(err) => warn!(%err, "could not enumerate volatile entries"),
        }

        self.consecutive_failures.store(0, Ordering::SeqCst);
        let status = StorageStatus::demoted(
            StorageMode::PlainPersistent,
            format!("demoted after repeated keychain write failures: {cause}"),
            unix_now(),
        );
        info!("storage demoted to plain-persistent");
        negotiator.transition(status);
        true
    }
}

/// Current Unix time in seconds; zero if the clock is before the epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::StorageBackend;
    use crate::test_support::faulty_set;

    /// Initializes in hybrid mode, then breaks the keychain so subsequent
    /// writes fail the way a locked keychain would at runtime.
    async fn controller_setup() -> (
        DemotionController,
        crate::backend::BackendSet,
        CapabilityNegotiator,
        HybridStore,
    ) {
        let (set, secure, _general) = faulty_set();
        let negotiator = CapabilityNegotiator::new(set.clone());
        negotiator.initialize().await;
        let hybrid = HybridStore::new(
            set.secure.clone().expect("secure"),
            set.general.clone().expect("general"),
        );
        secure.fail_sets(true);
        (DemotionController::new(), set, negotiator, hybrid)
    }

    #[tokio::test]
    async fn test_below_threshold_falls_back_to_volatile() {
        let (controller, set, negotiator, hybrid) = controller_setup().await;

        controller.handle_set_failure(
            &set,
            &negotiator,
            Some(&hybrid),
            "auth.session",
            "value",
            &SessionStoreError::Keychain("simulated".to_string()),
        );

        assert_eq!(
            set.volatile.get("auth.session").expect("get").as_deref(),
            Some("value")
        );
        // Mode unchanged below threshold.
        assert_eq!(
            negotiator.mode().expect("mode"),
            StorageMode::HybridEncrypted
        );
    }

    #[tokio::test]
    async fn test_threshold_triggers_demotion() {
        let (controller, set, negotiator, hybrid) = controller_setup().await;
        negotiator.initialize().await;
        let cause = SessionStoreError::Keychain("simulated".to_string());

        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v1", &cause);
        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v2", &cause);

        let status = negotiator.status().expect("status");
        assert_eq!(status.mode, StorageMode::PlainPersistent);
        assert!(status.degraded_at.is_some());
        assert!(status.error.expect("error").contains("demoted"));

        // The failing value landed in the general store, unencrypted.
        let general = set.general.as_ref().expect("general");
        assert_eq!(
            general
                .get(&names::plain_record("auth.session"))
                .expect("get")
                .as_deref(),
            Some("v2")
        );
        // The volatile overflow entry from the first failure was flushed.
        assert!(set.volatile.is_empty().expect("is_empty"));
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let (controller, set, negotiator, hybrid) = controller_setup().await;
        negotiator.initialize().await;
        let cause = SessionStoreError::Keychain("simulated".to_string());

        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v1", &cause);
        controller.record_success();
        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v2", &cause);

        // Two failures, but not consecutive: still hybrid.
        assert_eq!(
            negotiator.mode().expect("mode"),
            StorageMode::HybridEncrypted
        );
    }

    #[tokio::test]
    async fn test_unusable_general_store_leaves_mode_unchanged() {
        let (set, secure, general) = faulty_set();
        let negotiator = CapabilityNegotiator::new(set.clone());
        negotiator.initialize().await;
        let hybrid = HybridStore::new(
            set.secure.clone().expect("secure"),
            set.general.clone().expect("general"),
        );
        secure.fail_sets(true);
        general.fail_sets(true);
        let controller = DemotionController::new();
        let cause = SessionStoreError::Keychain("simulated".to_string());

        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v1", &cause);
        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v2", &cause);

        // Demotion did not succeed; the value sits in the volatile map.
        assert_eq!(
            negotiator.mode().expect("mode"),
            StorageMode::HybridEncrypted
        );
        assert_eq!(
            set.volatile.get("auth.session").expect("get").as_deref(),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_subscribers_notified_on_demotion() {
        let (controller, set, negotiator, hybrid) = controller_setup().await;
        negotiator.initialize().await;

        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Arc::new(tx);
        let sender = Arc::clone(&tx);
        negotiator.subscribe(Box::new(move |status| {
            let _ = sender.send(status.clone());
        }));
        // Drain the immediate on-subscribe notification.
        let initial = rx.try_recv().expect("initial status");
        assert_eq!(initial.mode, StorageMode::HybridEncrypted);

        let cause = SessionStoreError::Keychain("simulated".to_string());
        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v1", &cause);
        controller.handle_set_failure(&set, &negotiator, Some(&hybrid), "auth.session", "v2", &cause);

        let demoted = rx.try_recv().expect("demotion notification");
        assert_eq!(demoted.mode, StorageMode::PlainPersistent);
        assert!(demoted.degraded_at.is_some());
    }
}
