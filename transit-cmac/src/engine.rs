//! AES-CMAC computation over resolved key material
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


use crate::error::{CmacError, CmacResult};
use aes::{Aes128, Aes256};
use armoricore_keys::KeyType;
use cmac::{Cmac, Mac};

/// Native AES-CMAC output size in bytes
pub const CMAC_SIZE: usize = 16;

type CmacAes128 = Cmac<Aes128>;
type CmacAes256 = Cmac<Aes256>;

/// Validated truncation length.
///
/// `None` or `0` keep the native size; negative values and values above
/// [`CMAC_SIZE`] are rejected.
pub fn mac_length(requested: Option<i64>) -> CmacResult<Option<usize>> {
    match requested {
        None | Some(0) => Ok(None),
        Some(len) if len < 0 => Err(CmacError::InvalidParameter(format!(
            "invalid mac_length {}: must not be negative",
            len
        ))),
        Some(len) => match usize::try_from(len) {
            Ok(len) if len <= CMAC_SIZE => Ok(Some(len)),
            _ => Err(CmacError::InvalidParameter(format!(
                "invalid mac_length {}: must not exceed {} bytes",
                len, CMAC_SIZE
            ))),
        },
    }
}

enum CmacVariant {
    Aes128(CmacAes128),
    Aes256(CmacAes256),
}

impl CmacVariant {
    fn new(key_type: KeyType, key: &[u8]) -> CmacResult<Self> {
        let expected = match key_type {
            KeyType::Aes128Cmac => 16,
            KeyType::Aes256Cmac => 32,
            other => {
                return Err(CmacError::UnsupportedKeyType(format!(
                    "{} is not a CMAC key type",
                    other
                )))
            }
        };
        if key.len() != expected {
            return Err(CmacError::UnsupportedKeyType(format!(
                "{} requires a {}-byte key but the stored material is {} bytes",
                key_type,
                expected,
                key.len()
            )));
        }

        let init_failed = |_| {
            CmacError::Computation(format!("{} failed to initialize with stored key", key_type))
        };
        Ok(match key_type {
            KeyType::Aes128Cmac => {
                CmacVariant::Aes128(CmacAes128::new_from_slice(key).map_err(init_failed)?)
            }
            _ => CmacVariant::Aes256(CmacAes256::new_from_slice(key).map_err(init_failed)?),
        })
    }

    fn mac(self, data: &[u8]) -> Vec<u8> {
        match self {
            CmacVariant::Aes128(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            CmacVariant::Aes256(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}

/// Compute the CMAC of `input` under `key`, truncated to `mac_length` bytes
/// when set.
pub fn compute(
    key_type: KeyType,
    key: &[u8],
    input: &[u8],
    mac_length: Option<usize>,
) -> CmacResult<Vec<u8>> {
    let mut tag = CmacVariant::new(key_type, key)?.mac(input);
    if let Some(len) = mac_length {
        if len == 0 || len > tag.len() {
            return Err(CmacError::InvalidParameter(format!(
                "invalid mac_length {}: must be between 1 and {} bytes",
                len,
                tag.len()
            )));
        }
        tag.truncate(len);
    }
    Ok(tag)
}
