//! Synthetic backend capability probes.

use tracing::debug;
use uuid::Uuid;

use crate::backend::StorageBackend;
use crate::error::{SessionResult, SessionStoreError};
use crate::names;

/// Runs a full write → read-back → delete → read-after-delete cycle against
/// a private probe record, never touching caller data.
///
/// A backend is usable only if all four steps succeed, the read-back exactly
/// matches the written value, and the post-delete read returns absent.
///
/// # Errors
///
/// Returns [`SessionStoreError::ProbeFailed`] on a mismatch, or the
/// backend's own error if any step fails outright.
pub(crate) fn run_probe(backend: &dyn StorageBackend) -> SessionResult<()> {
    let record = names::probe_record();
    let value = format!("probe-{}", Uuid::new_v4());

    backend.set(&record, &value)?;

    let read_back = backend.get(&record)?;
    if read_back.as_deref() != Some(value.as_str()) {
        let _ = backend.remove(&record);
        return Err(SessionStoreError::ProbeFailed(format!(
            "{} read-back mismatch",
            backend.label()
        )));
    }

    backend.remove(&record)?;

    if backend.get(&record)?.is_some() {
        return Err(SessionStoreError::ProbeFailed(format!(
            "{} record survived delete",
            backend.label()
        )));
    }

    debug!(backend = backend.label(), "probe cycle passed");
    Ok(())
}
