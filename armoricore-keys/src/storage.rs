//! Storage backends for key policies
//!
//! The accessor in [`crate::policy_store`] only talks to storage through the
//! [`PolicyStorage`] trait, so durable backends can be swapped without touching
//! the request path.
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
use crate::policy::KeyPolicy;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Trait for key policy storage backends
#[async_trait]
pub trait PolicyStorage: Send + Sync {
    /// Load a policy by name; `Ok(None)` when it does not exist
    async fn load(&self, name: &str) -> KeyResult<Option<KeyPolicy>>;

    /// Create or overwrite a policy
    async fn save(&self, policy: &KeyPolicy) -> KeyResult<()>;

    /// List stored policy names
    async fn list(&self) -> KeyResult<Vec<String>>;
}

/// Non-durable storage, used by tests and embedded hosts
#[derive(Default)]
pub struct MemoryPolicyStorage {
    policies: RwLock<HashMap<String, KeyPolicy>>,
}

impl MemoryPolicyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStorage for MemoryPolicyStorage {
    async fn load(&self, name: &str) -> KeyResult<Option<KeyPolicy>> {
        Ok(self.policies.read().await.get(name).cloned())
    }

    async fn save(&self, policy: &KeyPolicy) -> KeyResult<()> {
        self.policies
            .write()
            .await
            .insert(policy.name().to_string(), policy.clone());
        Ok(())
    }

    async fn list(&self) -> KeyResult<Vec<String>> {
        let mut names: Vec<String> = self.policies.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
