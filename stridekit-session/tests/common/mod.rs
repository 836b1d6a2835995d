//! Shared backend doubles for integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use stridekit_session::backend::{BackendSet, MemoryBackend, StorageBackend};
use stridekit_session::{SessionResult, SessionStoreError};

static TRACING: Once = Once::new();

/// Installs a fmt subscriber once so `RUST_LOG` surfaces store internals
/// when a test fails.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Memory-backed store whose reads and writes can be broken at runtime,
/// simulating a locked keychain or an unusable disk.
pub struct ChaosBackend {
    label: &'static str,
    inner: MemoryBackend,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
}

impl ChaosBackend {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: MemoryBackend::new(),
            fail_get: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
        }
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    /// Direct access to the wrapped map for out-of-band inspection.
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }
}

impl StorageBackend for ChaosBackend {
    fn label(&self) -> &'static str {
        self.label
    }

    fn get(&self, record: &str) -> SessionResult<Option<String>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(SessionStoreError::Internal(format!(
                "{} simulated read failure",
                self.label
            )));
        }
        self.inner.get(record)
    }

    fn set(&self, record: &str, value: &str) -> SessionResult<()> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(SessionStoreError::Internal(format!(
                "{} simulated write failure",
                self.label
            )));
        }
        self.inner.set(record, value)
    }

    fn remove(&self, record: &str) -> SessionResult<()> {
        self.inner.remove(record)
    }
}

/// A native backend set with chaos-capable secure and general stores.
pub fn chaos_set() -> (BackendSet, Arc<ChaosBackend>, Arc<ChaosBackend>) {
    let secure = Arc::new(ChaosBackend::new("keychain"));
    let general = Arc::new(ChaosBackend::new("file-store"));
    let set = BackendSet {
        secure: Some(secure.clone()),
        general: Some(general.clone()),
        web: None,
        volatile: Arc::new(MemoryBackend::new()),
    };
    (set, secure, general)
}

/// A native backend set with plain in-memory stores.
pub fn memory_set() -> BackendSet {
    BackendSet::native(
        Arc::new(MemoryBackend::new()),
        Arc::new(MemoryBackend::new()),
    )
}
