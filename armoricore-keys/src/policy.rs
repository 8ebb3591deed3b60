//! Versioned key policy model
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
use crate::key_types::KeyType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One generation of key material
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyVersion {
    #[serde(with = "hex_material")]
    material: Vec<u8>,
    /// When this version was created
    pub created_at: i64,
}

impl KeyVersion {
    fn new(material: Vec<u8>) -> Self {
        Self {
            material,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVersion")
            .field("material", &format_args!("<{} bytes redacted>", self.material.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Named, versioned key container.
///
/// Versions are append-only and numbered from 1. `latest_version` always
/// equals the highest stored version and `min_encryption_version` never
/// exceeds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPolicy {
    name: String,
    key_type: KeyType,
    versions: BTreeMap<u32, KeyVersion>,
    latest_version: u32,
    min_encryption_version: u32,
    /// When the policy was created
    pub created_at: i64,
    /// When the policy was last updated
    pub updated_at: i64,
}

impl KeyPolicy {
    /// Create a policy whose version 1 holds `material`
    pub fn new(name: impl Into<String>, key_type: KeyType, material: Vec<u8>) -> KeyResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(KeyError::InvalidKeyMaterial(
                "key name must not be empty".to_string(),
            ));
        }
        check_material(key_type, &material)?;

        let now = chrono::Utc::now().timestamp();
        let mut versions = BTreeMap::new();
        versions.insert(1, KeyVersion::new(material));

        Ok(Self {
            name,
            key_type,
            versions,
            latest_version: 1,
            min_encryption_version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn latest_version(&self) -> u32 {
        self.latest_version
    }

    pub fn min_encryption_version(&self) -> u32 {
        self.min_encryption_version
    }

    /// Look up a stored version
    pub fn version(&self, version: u32) -> Option<&KeyVersion> {
        self.versions.get(&version)
    }

    /// Key material of a stored version
    pub fn key_material(&self, version: u32) -> Option<&[u8]> {
        self.versions.get(&version).map(KeyVersion::material)
    }

    /// Stored version numbers in ascending order
    pub fn version_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.versions.keys().copied()
    }

    /// Append a new version and make it the latest
    pub fn add_version(&mut self, material: Vec<u8>) -> KeyResult<u32> {
        check_material(self.key_type, &material)?;

        let next = self.latest_version.checked_add(1).ok_or_else(|| {
            KeyError::InvalidVersion(format!("key {} has exhausted its version space", self.name))
        })?;
        self.versions.insert(next, KeyVersion::new(material));
        self.latest_version = next;
        self.updated_at = chrono::Utc::now().timestamp();
        Ok(next)
    }

    /// Raise or lower the oldest version allowed for new MACs
    pub fn set_min_encryption_version(&mut self, version: u32) -> KeyResult<()> {
        if version == 0 || version > self.latest_version {
            return Err(KeyError::InvalidVersion(format!(
                "min_encryption_version must be between 1 and the latest version ({}), got {}",
                self.latest_version, version
            )));
        }
        if !self.versions.contains_key(&version) {
            return Err(KeyError::InvalidVersion(format!(
                "cannot set min_encryption_version to {}: version has been removed",
                version
            )));
        }
        self.min_encryption_version = version;
        self.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    /// Verify structural invariants of a policy loaded from storage
    pub fn check_invariants(&self) -> KeyResult<()> {
        let corrupt = |reason: String| KeyError::Corrupt {
            name: self.name.clone(),
            reason,
        };

        let highest = self.versions.keys().next_back().copied().unwrap_or(0);
        if highest != self.latest_version {
            return Err(corrupt(format!(
                "latest_version {} does not match highest stored version {}",
                self.latest_version, highest
            )));
        }
        if self.min_encryption_version == 0 || self.min_encryption_version > self.latest_version {
            return Err(corrupt(format!(
                "min_encryption_version {} outside 1..={}",
                self.min_encryption_version, self.latest_version
            )));
        }
        let mut required = self.min_encryption_version..=self.latest_version;
        if let Some(missing) = required.find(|v| !self.versions.contains_key(v)) {
            return Err(corrupt(format!("version {} is missing", missing)));
        }
        for (version, entry) in &self.versions {
            check_material(self.key_type, &entry.material)
                .map_err(|e| corrupt(format!("version {}: {}", version, e)))?;
        }
        Ok(())
    }
}

fn check_material(key_type: KeyType, material: &[u8]) -> KeyResult<()> {
    if key_type == KeyType::ManagedKey {
        return Ok(());
    }
    if material.is_empty() {
        return Err(KeyError::InvalidKeyMaterial(
            "key material must not be empty".to_string(),
        ));
    }
    match key_type.symmetric_key_len() {
        Some(expected) if material.len() != expected => Err(KeyError::InvalidKeyMaterial(format!(
            "{} keys require {} bytes but received {}",
            key_type,
            expected,
            material.len()
        ))),
        _ => Ok(()),
    }
}

mod hex_material {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
