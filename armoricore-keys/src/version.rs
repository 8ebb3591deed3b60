//! Key version resolution for new MAC / encryption operations
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

/// Requested version meaning "use the latest version"
pub const LATEST: i64 = 0;

/// Resolve a caller-requested version against the policy's bounds.
///
/// `0` selects the latest version. Any other value must lie in
/// `min_encryption_version..=latest_version`; negative values are rejected,
/// never coerced.
pub fn resolve_version(policy: &KeyPolicy, requested: i64) -> KeyResult<u32> {
    let latest = policy.latest_version();
    let min = policy.min_encryption_version();
    match requested {
        LATEST => Ok(latest),
        v if v < 0 => Err(KeyError::InvalidVersion(
            "cannot use negative key version".to_string(),
        )),
        v if v < i64::from(min) => Err(KeyError::InvalidVersion(format!(
            "cannot use key version {}: key version must be greater than or equal to \
             min_encryption_version ({})",
            v, min
        ))),
        v if v > i64::from(latest) => Err(KeyError::InvalidVersion(format!(
            "cannot use key version {}: key version must be less than or equal to \
             latest version ({})",
            v, latest
        ))),
        // Bounded by `latest` above, so the narrowing cannot fail.
        v => u32::try_from(v).map_err(|_| {
            KeyError::InvalidVersion(format!("cannot use key version {}", v))
        }),
    }
}
