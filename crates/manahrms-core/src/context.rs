//! Explicit wiring of the core for a host application.
//!
//! Build one `AppContext` at startup, call `session.initialize()`, and hand the
//! context to the UI layer. There is no global instance and no teardown; state
//! is memory plus the credential store.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::api::ApiClient;
use crate::auth::{
    CredentialStore, EncryptedFileStore, KeyringCredentialStore, MemoryCredentialStore,
    SessionManager, SessionRepository, StorageKeys,
};
use crate::config::{Config, StorageBackend};
use crate::profile::ProfileManager;
use crate::report::ErrorReporter;

pub struct AppContext {
    pub session: Arc<SessionManager>,
    pub profile: ProfileManager,
}

impl AppContext {
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let repo = SessionRepository::new(store, StorageKeys::default(), reporter);
        let api = ApiClient::new(config.base_url(), config.request_timeout(), repo)
            .context("Failed to create API client")?;
        let session = Arc::new(SessionManager::new(api));
        let profile = ProfileManager::new(session.clone());
        debug!(base_url = config.base_url(), "Context ready");
        Ok(Self { session, profile })
    }

    /// Open the credential store selected in `config`.
    ///
    /// The file backend needs a device secret to derive its key.
    pub async fn open_store(
        config: &Config,
        device_secret: Option<&[u8]>,
    ) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match config.storage {
            StorageBackend::Keyring => Arc::new(KeyringCredentialStore::default()),
            StorageBackend::Memory => Arc::new(MemoryCredentialStore::new()),
            StorageBackend::File => {
                let secret = device_secret
                    .ok_or_else(|| anyhow::anyhow!("File storage requires a device secret"))?;
                let path = config.credentials_path()?;
                let store = EncryptedFileStore::open(&path, secret)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                Arc::new(store)
            }
        };
        debug!(backend = ?config.storage, "Credential store opened");
        Ok(store)
    }
}
