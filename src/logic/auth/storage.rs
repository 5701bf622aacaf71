//! Secret Storage
//!
//! Key/value store for the access token and cached identity.
//! - [`MemorySecretStore`] - in-process, for tests and hosts with their own keychain
//! - [`EncryptedFileStore`] - AES-256-GCM encrypted JSON file, key derived
//!   from a host-supplied secret with SHA-256

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// Salt mixed into the host secret before hashing
const KEY_DERIVATION_PREFIX: &str = "Bugshake_Secret_Store_v1_";

/// Default file name under the data directory
const STORE_FILE_NAME: &str = "credentials.enc.json";

pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================================================
// MEMORY
// ============================================================================

#[derive(Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// ENCRYPTED FILE
// ============================================================================

/// On-disk format
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedFile {
    /// Hex nonce, fresh for every write
    nonce: String,
    /// Base64 AES-GCM ciphertext of the JSON map
    data: String,
    format_version: u32,
}

pub struct EncryptedFileStore {
    file_path: PathBuf,
    key: [u8; 32],
    values: Mutex<HashMap<String, String>>,
}

impl EncryptedFileStore {
    /// Open (or create) the store at `file_path`
    pub fn open(file_path: impl Into<PathBuf>, secret: &str) -> Result<Self, StoreError> {
        let file_path = file_path.into();
        let key = derive_key(secret);
        let values = if file_path.exists() {
            load(&file_path, &key)?
        } else {
            HashMap::new()
        };

        log::debug!("Secret store opened: {:?} ({} entries)", file_path, values.len());

        Ok(Self {
            file_path,
            key,
            values: Mutex::new(values),
        })
    }

    /// Open the store in the platform's local data directory
    pub fn open_default(secret: &str) -> Result<Self, StoreError> {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bugshake");

        fs::create_dir_all(&data_dir).map_err(|e| StoreError::Io(e.to_string()))?;
        Self::open(data_dir.join(STORE_FILE_NAME), secret)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(values).map_err(|e| StoreError::Parse(e.to_string()))?;

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| StoreError::Crypto(e.to_string()))?;
        let nonce_bytes: [u8; 12] = rand::random();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
            .map_err(|e| StoreError::Crypto(e.to_string()))?;

        let file = EncryptedFile {
            nonce: hex::encode(nonce_bytes),
            data: BASE64.encode(ciphertext),
            format_version: 1,
        };
        let content = serde_json::to_string_pretty(&file).map_err(|e| StoreError::Parse(e.to_string()))?;

        fs::write(&self.file_path, content).map_err(|e| StoreError::Io(e.to_string()))
    }
}

impl SecretStore for EncryptedFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_DERIVATION_PREFIX.as_bytes());
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

fn load(path: &Path, key: &[u8; 32]) -> Result<HashMap<String, String>, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
    let file: EncryptedFile = serde_json::from_str(&content).map_err(|e| StoreError::Parse(e.to_string()))?;

    let nonce_bytes = hex::decode(&file.nonce).map_err(|e| StoreError::Parse(e.to_string()))?;
    if nonce_bytes.len() != 12 {
        return Err(StoreError::Parse(format!("nonce must be 12 bytes, got {}", nonce_bytes.len())));
    }
    let ciphertext = BASE64.decode(&file.data).map_err(|e| StoreError::Parse(e.to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| StoreError::Crypto(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| StoreError::Crypto("decryption failed (wrong key or tampered file)".to_string()))?;

    serde_json::from_slice(&plaintext).map_err(|e| StoreError::Parse(e.to_string()))
}
