//! Fault-injecting backend doubles shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::{BackendSet, MemoryBackend, StorageBackend};
use crate::error::{SessionResult, SessionStoreError};

/// A memory-backed store whose failure behavior can be toggled per call
/// class, used to simulate locked keychains, full disks and flaky deletes.
pub(crate) struct FaultyBackend {
    label: &'static str,
    inner: MemoryBackend,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_remove: AtomicBool,
    corrupt_read: AtomicBool,
    ignore_remove: AtomicBool,
    set_calls: AtomicUsize,
}

impl FaultyBackend {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: MemoryBackend::new(),
            fail_get: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
            corrupt_read: AtomicBool::new(false),
            ignore_remove: AtomicBool::new(false),
            set_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_gets(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_sets(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_removes(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn corrupt_reads(&self, corrupt: bool) {
        self.corrupt_read.store(corrupt, Ordering::SeqCst);
    }

    pub(crate) fn ignore_removes(&self, ignore: bool) {
        self.ignore_remove.store(ignore, Ordering::SeqCst);
    }

    pub(crate) fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn inner_is_empty(&self) -> bool {
        self.inner.is_empty().expect("inner map")
    }

    fn fault(&self, operation: &str) -> SessionStoreError {
        SessionStoreError::Internal(format!("{} simulated {operation} failure", self.label))
    }
}

impl StorageBackend for FaultyBackend {
    fn label(&self) -> &'static str {
        self.label
    }

    fn get(&self, record: &str) -> SessionResult<Option<String>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(self.fault("read"));
        }
        let value = self.inner.get(record)?;
        if self.corrupt_read.load(Ordering::SeqCst) {
            return Ok(value.map(|v| format!("{v}!corrupted")));
        }
        Ok(value)
    }

    fn set(&self, record: &str, value: &str) -> SessionResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(self.fault("write"));
        }
        self.inner.set(record, value)
    }

    fn remove(&self, record: &str) -> SessionResult<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(self.fault("delete"));
        }
        if self.ignore_remove.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.remove(record)
    }
}

/// Backend set with fully working in-memory secure and general stores.
pub(crate) fn working_set() -> BackendSet {
    BackendSet::native(
        Arc::new(MemoryBackend::new()),
        Arc::new(MemoryBackend::new()),
    )
}

/// Backend set whose secure and general stores are fault-injectable.
pub(crate) fn faulty_set() -> (BackendSet, Arc<FaultyBackend>, Arc<FaultyBackend>) {
    let secure = Arc::new(FaultyBackend::new("keychain"));
    let general = Arc::new(FaultyBackend::new("file-store"));
    let set = BackendSet {
        secure: Some(secure.clone()),
        general: Some(general.clone()),
        web: None,
        volatile: Arc::new(MemoryBackend::new()),
    };
    (set, secure, general)
}
