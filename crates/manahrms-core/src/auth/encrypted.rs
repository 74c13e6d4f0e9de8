//! File-backed credential store for platforms without a usable keychain.
//!
//! All entries live in one JSON file. Each value is sealed with
//! ChaCha20-Poly1305, using the entry key as associated data so sealed values
//! cannot be swapped between keys. The cipher key is derived with Argon2id from
//! a host-supplied device secret and a random salt kept in the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use argon2::Argon2;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::credentials::{CredentialStore, StoreError, StoreResult};

/// File format version
const FORMAT_VERSION: u32 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedFile {
    version: u32,
    salt: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    entries: BTreeMap<String, SealedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedEntry {
    nonce: String,
    ciphertext: String,
}

pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: ChaCha20Poly1305,
    file: Mutex<SealedFile>,
}

impl EncryptedFileStore {
    /// Open the store at `path`, creating it (with a fresh salt) if missing.
    pub async fn open(path: impl Into<PathBuf>, device_secret: &[u8]) -> StoreResult<Self> {
        let path = path.into();
        let file = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let file: SealedFile = serde_json::from_str(&contents).map_err(|e| {
                    StoreError::Encoding(format!("Failed to parse credential file: {}", e))
                })?;
                if file.version != FORMAT_VERSION {
                    return Err(StoreError::Encoding(format!(
                        "Unsupported credential file version {}",
                        file.version
                    )));
                }
                file
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Creating credential file");
                let mut salt = [0u8; SALT_LEN];
                rand::thread_rng().fill_bytes(&mut salt);
                SealedFile {
                    version: FORMAT_VERSION,
                    salt: BASE64.encode(salt),
                    updated_at: Utc::now(),
                    entries: BTreeMap::new(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        let salt = decode(&file.salt)?;
        let cipher = derive_cipher(device_secret, &salt)?;

        Ok(Self {
            path,
            cipher,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(&self, key: &str, value: &str) -> StoreResult<SealedEntry> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: value.as_bytes(),
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Encoding(format!("Failed to seal {}", key)))?;
        Ok(SealedEntry {
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    fn open_entry(&self, key: &str, entry: &SealedEntry) -> StoreResult<String> {
        let nonce = decode(&entry.nonce)?;
        if nonce.len() != NONCE_LEN {
            return Err(StoreError::Encoding(format!("Bad nonce for {}", key)));
        }
        let ciphertext = decode(&entry.ciphertext)?;
        let plain = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Encoding(format!("Failed to unseal {}", key)))?;
        String::from_utf8(plain)
            .map_err(|e| StoreError::Encoding(format!("{} is not UTF-8: {}", key, e)))
    }

    /// Write to a sibling temp file, then rename over the original.
    async fn persist(&self, file: &SealedFile) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(file)
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn decode(value: &str) -> StoreResult<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| StoreError::Encoding(format!("Invalid base64: {}", e)))
}

fn derive_cipher(secret: &[u8], salt: &[u8]) -> StoreResult<ChaCha20Poly1305> {
    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(secret, salt, &mut key)
        .map_err(|e| StoreError::Encoding(format!("Key derivation failed: {}", e)))?;
    Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
}

#[async_trait]
impl CredentialStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let file = self.file.lock().await;
        match file.entries.get(key) {
            Some(entry) => self.open_entry(key, entry).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let sealed = self.seal(key, value)?;
        let mut file = self.file.lock().await;
        file.entries.insert(key.to_string(), sealed);
        file.updated_at = Utc::now();
        self.persist(&file).await
    }

    async fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        let mut file = self.file.lock().await;
        let mut changed = false;
        for key in keys {
            changed |= file.entries.remove(*key).is_some();
        }
        if !changed {
            return Ok(());
        }
        file.updated_at = Utc::now();
        self.persist(&file).await
    }
}
