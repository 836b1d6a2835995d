//! Backend record-name derivation.
//!
//! Hybrid-mode entries split into two record families: a key record in the
//! keychain-class store and a payload record in the general-purpose store.
//! Both names derive from the caller's logical key via SHA-256, so the same
//! logical key always maps to the same pair and distinct logical keys cannot
//! silently collide.

use sha2::{Digest, Sha256};
use uuid::Uuid;

const KEY_RECORD_PREFIX: &str = "stride.k.";
const PAYLOAD_RECORD_PREFIX: &str = "stride.p.";
const PLAIN_RECORD_PREFIX: &str = "stride.v.";
const PROBE_RECORD_PREFIX: &str = "stride.probe.";

/// The pair of backend record names for one hybrid-mode entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordNames {
    /// Keychain-store record holding the encoded entry key.
    pub(crate) key_record: String,
    /// General-store record holding the ciphertext envelope.
    pub(crate) payload_record: String,
}

impl RecordNames {
    /// Derives the record pair for a logical key.
    pub(crate) fn derive(logical_key: &str) -> Self {
        let tag = digest_tag(logical_key);
        Self {
            key_record: format!("{KEY_RECORD_PREFIX}{tag}"),
            payload_record: format!("{PAYLOAD_RECORD_PREFIX}{tag}"),
        }
    }
}

/// Record name for a plaintext value in the general store (plain-persistent
/// mode and demotion rewrites).
pub(crate) fn plain_record(logical_key: &str) -> String {
    format!("{PLAIN_RECORD_PREFIX}{}", digest_tag(logical_key))
}

/// A private, per-call record name for probe cycles. Never collides with
/// caller data or other probes.
pub(crate) fn probe_record() -> String {
    format!("{PROBE_RECORD_PREFIX}{}", Uuid::new_v4())
}

fn digest_tag(logical_key: &str) -> String {
    let digest = Sha256::digest(logical_key.as_bytes());
    hex::encode(&digest[..16])
}
