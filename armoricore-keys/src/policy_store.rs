//! Lock-scoped access to key policies
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
use crate::key_types::KeyType;
use crate::storage::PolicyStorage;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type PolicyLock = Arc<RwLock<KeyPolicy>>;

/// Policy accessor backed by a storage backend.
///
/// Every policy gets its own reader/writer lock the first time it is
/// touched. Readers (MAC generation) share the lock; mutations such as
/// rotation take it exclusively and wait for in-flight readers to finish.
/// Storage is never awaited while the lock table itself is held.
pub struct PolicyStore {
    storage: Arc<dyn PolicyStorage>,
    locks: RwLock<HashMap<String, PolicyLock>>,
    // Serializes `create` so two creators cannot both miss the same name.
    creating: Mutex<()>,
}

impl PolicyStore {
    pub fn new(storage: Arc<dyn PolicyStorage>) -> Self {
        Self {
            storage,
            locks: RwLock::new(HashMap::new()),
            creating: Mutex::new(()),
        }
    }

    /// Find the lock for `name`, loading the policy from storage on first use
    async fn policy_lock(&self, name: &str) -> KeyResult<PolicyLock> {
        if let Some(lock) = self.locks.read().await.get(name) {
            return Ok(Arc::clone(lock));
        }

        let policy = self
            .storage
            .load(name)
            .await?
            .ok_or_else(|| KeyError::NotFound(name.to_string()))?;

        // Another task may have cached it while we were loading; its copy wins.
        let mut locks = self.locks.write().await;
        let lock = match locks.entry(name.to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                debug!(key = name, latest_version = policy.latest_version(), "Policy cached");
                Arc::clone(entry.insert(Arc::new(RwLock::new(policy))))
            }
        };
        Ok(lock)
    }

    async fn read_guard(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> KeyResult<OwnedRwLockReadGuard<KeyPolicy>> {
        let lock = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(KeyError::Cancelled),
            lock = self.policy_lock(name) => lock?,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(KeyError::Cancelled),
            guard = lock.read_owned() => Ok(guard),
        }
    }

    /// Run `f` against the named policy while holding its read lock.
    ///
    /// The policy cannot change while `f` runs; other readers proceed
    /// concurrently. `f`'s result is returned unchanged. If `cancel` fires
    /// before the lock is acquired, `KeyError::Cancelled` is returned and
    /// `f` never runs.
    pub async fn with_read_locked_policy<T, E, F>(
        &self,
        name: &str,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&KeyPolicy) -> Result<T, E>,
        E: From<KeyError>,
    {
        let guard = self.read_guard(name, cancel).await?;
        f(&guard)
    }

    /// Like [`with_read_locked_policy`](Self::with_read_locked_policy), but
    /// `f` runs on the blocking thread pool.
    ///
    /// Use this for CPU-bound work so the runtime stays free to deliver
    /// cancellation while `f` runs. The read lock is held until `f` returns.
    pub async fn with_read_locked_policy_blocking<T, E, F>(
        &self,
        name: &str,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&KeyPolicy) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<KeyError> + Send + 'static,
    {
        let guard = self.read_guard(name, cancel).await?;
        tokio::task::spawn_blocking(move || f(&guard))
            .await
            .map_err(|e| KeyError::Task(e.to_string()))?
    }

    /// Run `f` against a copy of the named policy while holding its write
    /// lock, persist the copy, then publish it.
    ///
    /// If `f` or the storage write fails, the cached policy is left untouched.
    pub async fn with_write_locked_policy<T, F>(
        &self,
        name: &str,
        cancel: &CancellationToken,
        f: F,
    ) -> KeyResult<T>
    where
        F: FnOnce(&mut KeyPolicy) -> KeyResult<T>,
    {
        let lock = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(KeyError::Cancelled),
            lock = self.policy_lock(name) => lock?,
        };

        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(KeyError::Cancelled),
            guard = lock.write() => guard,
        };

        let mut updated = guard.clone();
        let value = f(&mut updated)?;
        updated.check_invariants()?;
        self.storage.save(&updated).await?;
        *guard = updated;
        Ok(value)
    }

    /// Register a new policy
    pub async fn create(&self, policy: KeyPolicy) -> KeyResult<()> {
        policy.check_invariants()?;
        let name = policy.name().to_string();

        let _creating = self.creating.lock().await;
        let cached = self.locks.read().await.contains_key(&name);
        if cached || self.storage.load(&name).await?.is_some() {
            return Err(KeyError::AlreadyExists(name));
        }

        self.storage.save(&policy).await?;
        info!(key = %name, key_type = %policy.key_type(), "Created key policy");
        self.locks
            .write()
            .await
            .entry(name)
            .or_insert_with(|| Arc::new(RwLock::new(policy)));
        Ok(())
    }

    /// Append a new key version; blocks until in-flight readers release
    pub async fn rotate(
        &self,
        name: &str,
        material: Vec<u8>,
        cancel: &CancellationToken,
    ) -> KeyResult<u32> {
        let version = self
            .with_write_locked_policy(name, cancel, |policy| policy.add_version(material))
            .await?;
        info!(key = name, version, "Rotated key");
        Ok(version)
    }

    /// Create `name` with `material` as version 1, or append `material` as a
    /// new version if the key exists with the same type.
    ///
    /// Returns the version the material was stored under.
    pub async fn import(
        &self,
        name: &str,
        key_type: KeyType,
        material: Vec<u8>,
        cancel: &CancellationToken,
    ) -> KeyResult<u32> {
        match self.create(KeyPolicy::new(name, key_type, material.clone())?).await {
            Ok(()) => return Ok(1),
            Err(KeyError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }

        let version = self
            .with_write_locked_policy(name, cancel, |policy| {
                if policy.key_type() != key_type {
                    return Err(KeyError::KeyTypeMismatch {
                        name: policy.name().to_string(),
                        existing: policy.key_type(),
                        requested: key_type,
                    });
                }
                policy.add_version(material)
            })
            .await?;
        info!(key = name, version, "Imported key version");
        Ok(version)
    }

    /// Change the oldest version allowed for new operations
    pub async fn set_min_encryption_version(
        &self,
        name: &str,
        version: u32,
        cancel: &CancellationToken,
    ) -> KeyResult<()> {
        self.with_write_locked_policy(name, cancel, |policy| {
            policy.set_min_encryption_version(version)
        })
        .await?;
        info!(key = name, min_encryption_version = version, "Updated key policy");
        Ok(())
    }

    /// List all stored policy names
    pub async fn list_keys(&self) -> KeyResult<Vec<String>> {
        self.storage.list().await
    }
}
