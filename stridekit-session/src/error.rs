//! Error types for session storage components.

use thiserror::Error;

/// Result type for session storage operations.
pub type SessionResult<T> = Result<T, SessionStoreError>;

/// Errors raised by session storage primitives.
///
/// Most of these never cross the public facade: read-side failures collapse
/// to "entry absent" and write-side failures are absorbed by the demotion
/// path. They surface directly only from backend constructors and probes.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Errors coming from the OS keychain store.
    #[error("keychain error: {0}")]
    Keychain(String),

    /// Errors coming from the general-purpose file store.
    #[error("file store error: {0}")]
    FileStore(String),

    /// Errors coming from the browser persistent store.
    #[error("web storage error: {0}")]
    WebStore(String),

    /// Cryptographic failures (AEAD seal/open, key material parsing).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The OS secure random source is unavailable. Key and nonce generation
    /// refuse to fall back to anything weaker.
    #[error("secure randomness unavailable: {0}")]
    InsecureRandom(String),

    /// Malformed or truncated ciphertext envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// A value exceeds the keychain per-item capacity.
    #[error("value too large for keychain: {size} bytes (limit {limit})")]
    ValueTooLarge {
        /// Size of the rejected value in bytes.
        size: usize,
        /// The per-item ceiling enforced by the backend.
        limit: usize,
    },

    /// A backend failed its synthetic write/read/delete probe cycle.
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// An internal invariant was violated (e.g. a poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}
