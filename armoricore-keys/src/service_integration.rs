//! Service integration helpers for opening the policy store
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


use crate::error::KeyResult;
use crate::local_store::LocalPolicyStorage;
use crate::policy_store::PolicyStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Open the encrypted on-disk policy store for a service.
///
/// The master key is read from `ARMORICORE_MASTER_KEY` unless given.
pub async fn init_policy_store(
    storage_path: &Path,
    master_key: Option<&[u8]>,
) -> KeyResult<Arc<PolicyStore>> {
    info!(path = %storage_path.display(), "Initializing policy store");

    let storage = LocalPolicyStorage::new(storage_path, master_key).await?;
    Ok(Arc::new(PolicyStore::new(Arc::new(storage))))
}
