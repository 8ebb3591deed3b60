//! Error types for key policy management
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


use crate::key_types::KeyType;
use thiserror::Error;

/// Key policy errors
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    #[error("Key {name} has type {existing}, not {requested}")]
    KeyTypeMismatch {
        name: String,
        existing: KeyType,
        requested: KeyType,
    },

    #[error("{0}")]
    InvalidVersion(String),

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Corrupt policy {name}: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Task join error: {0}")]
    Task(String),
}

/// Result type for key operations
pub type KeyResult<T> = Result<T, KeyError>;
