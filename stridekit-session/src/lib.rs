//! StrideKit session storage.
//!
//! Resilient encrypted key-value storage for on-device authentication
//! session material. The store survives partial platform failures — a locked
//! keychain, a corrupted secure enclave, browser private mode — without
//! losing the session or silently writing secrets in the clear, while
//! session payloads may exceed the tiny capacity of OS-backed secure
//! storage.
//!
//! # Architecture
//!
//! Capability probes run once at startup and select the strongest usable
//! mode:
//!
//! 1. **Hybrid-encrypted** — a fresh per-entry key in the OS keychain, the
//!    XChaCha20-Poly1305 envelope in a general-purpose store. The OS
//!    encryption guarantee is decoupled from the keychain's ~2 KiB per-item
//!    ceiling.
//! 2. **Plain-persistent** — plaintext values in the general store, when the
//!    keychain is unusable or after runtime demotion.
//! 3. **Web-persistent** — browser `localStorage` (wasm32 targets).
//! 4. **Volatile** — an in-process map, always available, lost on exit.
//!
//! Repeated write failures demote the store one-directionally at runtime;
//! entries written by older app versions in the legacy single-store layout
//! migrate lazily on first read.
//!
//! # Example
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use stridekit_session::{SessionStore, SessionStoreConfig};
//!
//! let store = SessionStore::open(SessionStoreConfig::new(
//!     "fit.stridekit.app",
//!     "/var/data/stridekit/session-store",
//! ))
//! .expect("session store directory");
//!
//! let status = store.initialize().await;
//! println!("storage mode: {}", status.mode);
//!
//! store.set_item("auth.session", "{\"token\":\"…\"}").await;
//! let session = store.get_item("auth.session").await;
//! # let _ = session;
//! # });
//! ```

pub mod backend;
mod cipher;
mod demotion;
mod error;
mod hybrid;
mod migration;
mod names;
mod negotiator;
mod probe;
mod status;
mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{SessionResult, SessionStoreError};
pub use migration::DEFAULT_LEGACY_PREFIXES;
pub use status::{StorageMode, StorageStatus, SubscriberId};
pub use store::{SessionStorage, SessionStorageAdapter, SessionStore};

#[cfg(not(target_arch = "wasm32"))]
pub use store::SessionStoreConfig;
