//! Authentication module: credential storage and the session authority.
//!
//! This module provides:
//! - `CredentialStore`: durable key-value storage (memory, OS keychain, encrypted file)
//! - `SessionRepository`: load/save/clear of the persisted session
//! - `Session`/`SessionSnapshot`: in-memory session state and its UI projection
//! - `SessionManager`: login, logout, user updates, and 401 re-sync

pub mod credentials;
pub mod encrypted;
pub mod manager;
pub mod repository;
pub mod session;

pub use credentials::{
    CredentialStore, KeyringCredentialStore, MemoryCredentialStore, StorageKeys, StoreError,
    StoreResult, DEFAULT_KEYRING_SERVICE, DEFAULT_KEY_PREFIX,
};
pub use encrypted::EncryptedFileStore;
pub use manager::SessionManager;
pub use repository::{PersistedSession, SessionRepository};
pub use session::{Session, SessionPhase, SessionSnapshot};
