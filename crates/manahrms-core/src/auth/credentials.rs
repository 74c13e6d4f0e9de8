use std::collections::HashMap;

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;
use tokio::sync::Mutex;

/// Default namespace prepended to every storage key
pub const DEFAULT_KEY_PREFIX: &str = "@manahrms:";

/// Keychain service name used by `KeyringCredentialStore`
pub const DEFAULT_KEYRING_SERVICE: &str = "manahrms";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Credential backend error: {0}")]
    Backend(String),

    #[error("Credential encoding error: {0}")]
    Encoding(String),

    #[error("Credential file error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable string key-value storage for session artifacts.
///
/// Implementations hold no policy. Removing a key that is not present succeeds.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn remove_many(&self, keys: &[&str]) -> StoreResult<()>;
}

/// Names of the three session entries under an application prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub user_data: String,
}

impl StorageKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            access_token: format!("{}auth_token", prefix),
            refresh_token: format!("{}refresh_token", prefix),
            user_data: format!("{}user_data", prefix),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.access_token, &self.refresh_token, &self.user_data]
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// OS keychain store, one keychain entry per key.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(service: &str, key: &str) -> StoreResult<Entry> {
        Entry::new(service, key)
            .map_err(|e| StoreError::Backend(format!("Failed to create keyring entry: {}", e)))
    }

    /// Keychain calls block; keep them off the async executor.
    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(String) -> StoreResult<T> + Send + 'static,
    {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || op(service))
            .await
            .map_err(|e| StoreError::Backend(format!("Keychain task failed: {}", e)))?
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE)
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.blocking(move |service| {
            match Self::entry(&service, &key)?.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(StoreError::Backend(format!(
                    "Failed to read {} from keychain: {}",
                    key, e
                ))),
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |service| {
            Self::entry(&service, &key)?
                .set_password(&value)
                .map_err(|e| {
                    StoreError::Backend(format!("Failed to store {} in keychain: {}", key, e))
                })?;

            // Read back through a fresh entry; a backend without storage keeps nothing.
            match Self::entry(&service, &key)?.get_password() {
                Ok(stored) if stored == value => Ok(()),
                Ok(_) | Err(keyring::Error::NoEntry) => Err(StoreError::Backend(format!(
                    "Keychain did not retain {}",
                    key
                ))),
                Err(e) => Err(StoreError::Backend(format!(
                    "Failed to verify {} in keychain: {}",
                    key, e
                ))),
            }
        })
        .await
    }

    async fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.blocking(move |service| {
            // Attempt every key; report the first failure afterwards.
            let mut first_error = None;
            for key in &keys {
                let result = Self::entry(&service, key).and_then(|entry| {
                    match entry.delete_credential() {
                        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                        Err(e) => Err(StoreError::Backend(format!(
                            "Failed to delete {} from keychain: {}",
                            key, e
                        ))),
                    }
                });
                if let Err(e) = result {
                    first_error.get_or_insert(e);
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
        .await
    }
}
