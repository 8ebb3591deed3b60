//! Key type definitions
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


use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key algorithm classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "aes128-gcm96")]
    Aes128Gcm96,
    #[serde(rename = "aes256-gcm96")]
    Aes256Gcm96,
    #[serde(rename = "chacha20-poly1305")]
    Chacha20Poly1305,
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "ecdsa-p256")]
    EcdsaP256,
    #[serde(rename = "rsa-2048")]
    Rsa2048,
    #[serde(rename = "hmac")]
    Hmac,
    #[serde(rename = "aes128-cmac")]
    Aes128Cmac,
    #[serde(rename = "aes256-cmac")]
    Aes256Cmac,
    /// Key material lives in an external managed key provider
    #[serde(rename = "managed_key")]
    ManagedKey,
}

impl KeyType {
    pub const ALL: [KeyType; 10] = [
        KeyType::Aes128Gcm96,
        KeyType::Aes256Gcm96,
        KeyType::Chacha20Poly1305,
        KeyType::Ed25519,
        KeyType::EcdsaP256,
        KeyType::Rsa2048,
        KeyType::Hmac,
        KeyType::Aes128Cmac,
        KeyType::Aes256Cmac,
        KeyType::ManagedKey,
    ];

    /// Canonical identifier, as used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Aes128Gcm96 => "aes128-gcm96",
            KeyType::Aes256Gcm96 => "aes256-gcm96",
            KeyType::Chacha20Poly1305 => "chacha20-poly1305",
            KeyType::Ed25519 => "ed25519",
            KeyType::EcdsaP256 => "ecdsa-p256",
            KeyType::Rsa2048 => "rsa-2048",
            KeyType::Hmac => "hmac",
            KeyType::Aes128Cmac => "aes128-cmac",
            KeyType::Aes256Cmac => "aes256-cmac",
            KeyType::ManagedKey => "managed_key",
        }
    }

    /// Whether keys of this type can produce a CMAC
    pub fn supports_cmac(&self) -> bool {
        matches!(self, KeyType::Aes128Cmac | KeyType::Aes256Cmac)
    }

    /// Required length of raw symmetric key material, if the type fixes one.
    ///
    /// Asymmetric, HMAC and managed keys return `None`: their material is
    /// opaque to this crate.
    pub fn symmetric_key_len(&self) -> Option<usize> {
        match self {
            KeyType::Aes128Gcm96 | KeyType::Aes128Cmac => Some(16),
            KeyType::Aes256Gcm96 | KeyType::Aes256Cmac | KeyType::Chacha20Poly1305 => Some(32),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown key type `{}`", s))
    }
}
