use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::credentials::{CredentialStore, StorageKeys, StoreError};
use crate::models::UserRecord;
use crate::report::ErrorReporter;

/// Durable form of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: UserRecord,
}

/// Reconciles the session with the credential store.
///
/// Every failure is handed to the reporter and absorbed: `load` resolves to
/// "no session", `save` and `clear` leave storage possibly stale.
/// Clone is cheap; the transport and the session manager share one instance.
/// Writes through any clone are serialized.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn CredentialStore>,
    keys: StorageKeys,
    reporter: Arc<dyn ErrorReporter>,
    writes: Arc<Mutex<()>>,
}

impl SessionRepository {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        keys: StorageKeys,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            store,
            keys,
            reporter,
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.reporter
    }

    /// Restore a persisted session. Requires both token and user.
    pub async fn load(&self) -> Option<PersistedSession> {
        let (token, refresh_token, user) = futures::join!(
            self.store.get(&self.keys.access_token),
            self.store.get(&self.keys.refresh_token),
            self.store.get(&self.keys.user_data),
        );

        let token = self.absorb(token, "reading access token")??;
        let user = self.absorb(user, "reading user record")??;
        // Refresh token is optional; a failed read only loses it.
        let refresh_token = self.absorb(refresh_token, "reading refresh token").flatten();

        let user = match serde_json::from_str::<serde_json::Value>(&user)
            .ok()
            .and_then(UserRecord::from_value)
        {
            Some(user) => user,
            None => {
                self.reporter.report(
                    &StoreError::Encoding("stored user record is not a JSON object".to_string()),
                    "restoring session",
                );
                return None;
            }
        };

        debug!(has_refresh_token = refresh_token.is_some(), "Persisted session restored");
        Some(PersistedSession {
            access_token: token,
            refresh_token,
            user,
        })
    }

    /// Persist token, optional refresh token, and user.
    ///
    /// A session without a refresh token removes any stored one.
    pub async fn save(&self, session: &PersistedSession) {
        let _writes = self.writes.lock().await;
        let result = self
            .store
            .set(&self.keys.access_token, &session.access_token)
            .await;
        self.absorb(result, "saving access token");

        match session.refresh_token {
            Some(ref refresh_token) => {
                let result = self.store.set(&self.keys.refresh_token, refresh_token).await;
                self.absorb(result, "saving refresh token");
            }
            None => {
                let result = self.store.remove_many(&[self.keys.refresh_token.as_str()]).await;
                self.absorb(result, "removing refresh token");
            }
        }

        match serde_json::to_string(&session.user) {
            Ok(user) => {
                let result = self.store.set(&self.keys.user_data, &user).await;
                self.absorb(result, "saving user record");
            }
            Err(e) => self.reporter.report(&e, "serializing user record"),
        }
    }

    /// Remove all three entries.
    pub async fn clear(&self) {
        let _writes = self.writes.lock().await;
        self.remove_all().await;
    }

    /// Remove all entries unless the stored token differs from `expected`.
    ///
    /// Returns false when a newer session owns storage. Check and removal
    /// hold the write lock, so a concurrent `save` is never wiped.
    pub async fn clear_if_token(&self, expected: Option<&str>) -> bool {
        let _writes = self.writes.lock().await;
        let current = self.access_token().await;
        if current.is_some() && current.as_deref() != expected {
            return false;
        }
        self.remove_all().await;
        true
    }

    async fn remove_all(&self) {
        let result = self.store.remove_many(&self.keys.all()).await;
        self.absorb(result, "clearing session");
        debug!("Persisted session cleared");
    }

    /// Current access token, `None` if absent or unreadable.
    pub async fn access_token(&self) -> Option<String> {
        let result = self.store.get(&self.keys.access_token).await;
        self.absorb(result, "reading access token").flatten()
    }

    fn absorb<T>(&self, result: Result<T, StoreError>, context: &str) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.reporter.report(&e, context);
                None
            }
        }
    }
}
