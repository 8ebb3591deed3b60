//! Local encrypted key policy storage
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::{KeyError, KeyResult};
use crate::policy::KeyPolicy;
use crate::storage::PolicyStorage;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Environment variable holding the storage master key
pub const MASTER_KEY_ENV: &str = "ARMORICORE_MASTER_KEY";

const POLICY_EXTENSION: &str = "policy";
const NONCE_LEN: usize = 12;

/// Master key for sealing stored policies
type MasterKey = [u8; 32];

/// One file per policy, JSON sealed with AES-256-GCM.
///
/// File names are the hex encoding of the policy name, so arbitrary names
/// never collide or escape the storage directory.
pub struct LocalPolicyStorage {
    storage_path: PathBuf,
    master_key: MasterKey,
}

impl LocalPolicyStorage {
    /// Open (and create if needed) a storage directory
    ///
    /// # Arguments
    /// * `storage_path` - Directory where sealed policies are kept
    /// * `master_key` - 32-byte master key; if None, read from `ARMORICORE_MASTER_KEY`
    pub async fn new<P: AsRef<Path>>(
        storage_path: P,
        master_key: Option<&[u8]>,
    ) -> KeyResult<Self> {
        let storage_path = storage_path.as_ref().to_path_buf();
        fs::create_dir_all(&storage_path).await?;

        let master_key = match master_key {
            Some(key) => {
                let key: MasterKey = key.try_into().map_err(|_| {
                    KeyError::Configuration("Master key must be exactly 32 bytes".to_string())
                })?;
                key
            }
            None => master_key_from_env()?,
        };

        debug!(path = %storage_path.display(), "Opened local policy storage");
        Ok(Self {
            storage_path,
            master_key,
        })
    }

    fn seal(&self, plaintext: &[u8]) -> KeyResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(&self.master_key.into());
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| KeyError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8]) -> KeyResult<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(KeyError::Decryption("Sealed policy too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(&self.master_key.into());
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| KeyError::Decryption(format!("Decryption failed: {}", e)))
    }

    fn policy_path(&self, name: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.{}", hex::encode(name), POLICY_EXTENSION))
    }
}

/// Read the master key from `ARMORICORE_MASTER_KEY`.
///
/// A 64-character hex value is used as-is; anything else is treated as a
/// passphrase and hashed with SHA-256.
pub fn master_key_from_env() -> KeyResult<MasterKey> {
    let value = std::env::var(MASTER_KEY_ENV).map_err(|_| {
        KeyError::Configuration(format!(
            "{} must be set to open encrypted policy storage",
            MASTER_KEY_ENV
        ))
    })?;
    Ok(master_key_from_str(&value))
}

fn master_key_from_str(value: &str) -> MasterKey {
    if let Ok(bytes) = hex::decode(value) {
        if let Ok(key) = MasterKey::try_from(bytes.as_slice()) {
            return key;
        }
    }
    let hash = Sha256::digest(value.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&hash);
    key
}

#[async_trait]
impl PolicyStorage for LocalPolicyStorage {
    async fn load(&self, name: &str) -> KeyResult<Option<KeyPolicy>> {
        let path = self.policy_path(name);
        let sealed = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let plaintext = self.open(&sealed)?;
        let policy: KeyPolicy = serde_json::from_slice(&plaintext)?;
        if policy.name() != name {
            return Err(KeyError::Corrupt {
                name: name.to_string(),
                reason: format!("file holds policy `{}`", policy.name()),
            });
        }
        policy.check_invariants()?;

        debug!(key = name, latest_version = policy.latest_version(), "Loaded policy");
        Ok(Some(policy))
    }

    async fn save(&self, policy: &KeyPolicy) -> KeyResult<()> {
        let json = serde_json::to_vec(policy)?;
        let sealed = self.seal(&json)?;

        // Write-then-rename so a crash never leaves a truncated policy behind.
        let path = self.policy_path(policy.name());
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &sealed).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key = policy.name(), latest_version = policy.latest_version(), "Saved policy");
        Ok(())
    }

    async fn list(&self) -> KeyResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.storage_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(POLICY_EXTENSION) {
                continue;
            }
            let decoded = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| hex::decode(stem).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(name) => names.push(name),
                None => warn!(path = %path.display(), "Skipping unrecognized policy file"),
            }
        }
        names.sort();
        Ok(names)
    }
}
