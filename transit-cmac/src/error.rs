//! Error taxonomy for CMAC generation
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


use armoricore_keys::KeyError;
use thiserror::Error;

/// Classification handed to the host for status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    UnsupportedKeyType,
    InvalidVersion,
    MissingInput,
    InvalidParameter,
    Computation,
    Cancelled,
    Storage,
}

/// CMAC generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CmacError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    UnsupportedKeyType(String),

    #[error("{0}")]
    InvalidVersion(String),

    #[error("{0}")]
    MissingInput(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("CMAC computation failed: {0}")]
    Computation(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),
}

impl CmacError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CmacError::NotFound(_) => ErrorKind::NotFound,
            CmacError::UnsupportedKeyType(_) => ErrorKind::UnsupportedKeyType,
            CmacError::InvalidVersion(_) => ErrorKind::InvalidVersion,
            CmacError::MissingInput(_) => ErrorKind::MissingInput,
            CmacError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            CmacError::Computation(_) => ErrorKind::Computation,
            CmacError::Cancelled => ErrorKind::Cancelled,
            CmacError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<KeyError> for CmacError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::NotFound(name) => CmacError::NotFound(name),
            KeyError::InvalidVersion(msg) => CmacError::InvalidVersion(msg),
            KeyError::Cancelled => CmacError::Cancelled,
            KeyError::Task(msg) => CmacError::Computation(msg),
            other => CmacError::Storage(other.to_string()),
        }
    }
}

/// Result type for CMAC operations
pub type CmacResult<T> = Result<T, CmacError>;
