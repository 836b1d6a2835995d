//! Symmetric encryption for session entries.
//!
//! Each logical entry is sealed with its own freshly generated 256-bit key
//! under XChaCha20-Poly1305. The envelope (`nonce || ciphertext+tag`) travels
//! as a single base64 string in the general-purpose store; the key travels
//! base64-encoded in the OS keychain.
//!
//! Key and nonce material comes from the OS secure random source only. If
//! that source is unavailable the cipher refuses to operate; there is no
//! fallback generator.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{SessionResult, SessionStoreError};

/// AEAD nonce size for XChaCha20-Poly1305.
const NONCE_SIZE: usize = 24;
/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;
/// Associated data binding envelopes to this record family.
const ENTRY_AD: &[u8] = b"stride:session-entry";

/// Per-entry encryption key (256-bit).
///
/// Generated fresh for every `set` of a hybrid-mode entry, never reused
/// across entries and never derived from user input. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct EntryKey([u8; 32]);

impl EntryKey {
    /// Generates a new random entry key from the OS secure random source.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::InsecureRandom`] if the platform cannot
    /// provide secure randomness. This is the one storage fault that is not
    /// absorbed into a weaker mode.
    pub(crate) fn generate() -> SessionResult<Self> {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes)
            .map_err(|err| SessionStoreError::InsecureRandom(err.to_string()))?;
        Ok(Self(bytes))
    }

    /// Encodes the key for storage as a keychain record (44 characters).
    pub(crate) fn to_encoded(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Parses a key previously produced by [`Self::to_encoded`].
    pub(crate) fn from_encoded(encoded: &str) -> SessionResult<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| SessionStoreError::Crypto(format!("key record decode: {err}")))?;
        let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            SessionStoreError::Crypto(format!(
                "key record length mismatch: expected 32, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }
}

impl std::fmt::Debug for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryKey").field("key", &"[REDACTED]").finish()
    }
}

/// Seals `plaintext` under `key`, returning the envelope string.
///
/// A fresh random nonce is drawn for every call; nonce reuse with the same
/// key cannot happen because keys are never handed back to this function
/// outside the sequencing in the hybrid store.
pub(crate) fn encrypt(plaintext: &str, key: &EntryKey) -> SessionResult<String> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|err| SessionStoreError::InsecureRandom(err.to_string()))?;

    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext.as_bytes(),
                aad: ENTRY_AD,
            },
        )
        .map_err(|err| SessionStoreError::Crypto(format!("seal failed: {err}")))?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(envelope))
}

/// Opens an envelope produced by [`encrypt`], returning the plaintext.
///
/// Tampered or truncated envelopes are rejected; garbage plaintext is never
/// returned. Callers treat any failure here as "entry absent".
pub(crate) fn decrypt(envelope: &str, key: &EntryKey) -> SessionResult<String> {
    let bytes = BASE64
        .decode(envelope)
        .map_err(|err| SessionStoreError::InvalidEnvelope(format!("envelope decode: {err}")))?;
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(SessionStoreError::InvalidEnvelope(format!(
            "envelope too short: {} bytes",
            bytes.len()
        )));
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: ENTRY_AD,
            },
        )
        .map_err(|_| SessionStoreError::Crypto("envelope authentication failed".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|err| SessionStoreError::InvalidEnvelope(format!("plaintext not UTF-8: {err}")))
}
