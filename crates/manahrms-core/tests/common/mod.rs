//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use manahrms_core::auth::{
    CredentialStore, MemoryCredentialStore, SessionManager, SessionRepository, StorageKeys,
    StoreError, StoreResult,
};
use manahrms_core::{ApiClient, ErrorReporter, ProfileManager};

pub const TOKEN_KEY: &str = "@manahrms:auth_token";
pub const REFRESH_KEY: &str = "@manahrms:refresh_token";
pub const USER_KEY: &str = "@manahrms:user_data";

/// Memory store that counts `remove_many` calls.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryCredentialStore,
    clears: AtomicUsize,
}

impl CountingStore {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value).await
    }

    async fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_many(keys).await
    }
}

/// Memory store whose reads take `delay` to return, after the value was read.
pub struct SlowReadStore {
    inner: MemoryCredentialStore,
    delay: Duration,
}

impl SlowReadStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryCredentialStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl CredentialStore for SlowReadStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self.inner.get(key).await;
        tokio::time::sleep(self.delay).await;
        value
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value).await
    }

    async fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        self.inner.remove_many(keys).await
    }
}

/// Store whose writes always fail; reads find nothing.
pub struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Backend(format!("disk full writing {}", key)))
    }

    async fn remove_many(&self, _keys: &[&str]) -> StoreResult<()> {
        Err(StoreError::Backend("disk full".to_string()))
    }
}

/// Reporter that keeps every context it was handed.
#[derive(Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn contexts(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, _error: &(dyn Error + 'static), context: &str) {
        self.reports.lock().unwrap().push(context.to_string());
    }
}

pub fn api_with(
    base_url: &str,
    store: Arc<dyn CredentialStore>,
    reporter: Arc<dyn ErrorReporter>,
) -> ApiClient {
    let repo = SessionRepository::new(store, StorageKeys::default(), reporter);
    ApiClient::new(base_url, Duration::from_secs(5), repo).unwrap()
}

pub fn api(base_url: &str, store: Arc<dyn CredentialStore>) -> ApiClient {
    api_with(base_url, store, Arc::new(CollectingReporter::default()))
}

pub fn managers(
    base_url: &str,
    store: Arc<dyn CredentialStore>,
) -> (Arc<SessionManager>, ProfileManager) {
    let session = Arc::new(SessionManager::new(api(base_url, store)));
    let profile = ProfileManager::new(session.clone());
    (session, profile)
}

pub async fn seed_session(store: &dyn CredentialStore, token: &str, user_json: &str) {
    store.set(TOKEN_KEY, token).await.unwrap();
    store.set(USER_KEY, user_json).await.unwrap();
}
