//! Entry point for CMAC generation requests
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


use crate::assembler::{assemble, process_items, BatchContext};
use crate::batch::normalize;
use crate::engine;
use crate::error::{CmacError, CmacResult};
use crate::request::{CmacRequest, CmacResponse};
use armoricore_keys::{resolve_version, KeyPolicy, KeyType, PolicyStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Generates CMACs against policies held by a [`PolicyStore`]
pub struct CmacHandler {
    store: Arc<PolicyStore>,
    parallelism: usize,
}

impl CmacHandler {
    /// Create a handler that computes batches sequentially
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self {
            store,
            parallelism: 1,
        }
    }

    /// Compute batch items on up to `parallelism` threads
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Generate a CMAC for every input of `request`.
    ///
    /// Whole-request failures (unknown key, unsupported key type, bad
    /// `mac_length`, bad default version, cancellation) are returned as `Err`
    /// before any item is processed. Per-item failures are reported inside a
    /// batch response. Items are computed on the blocking pool under the
    /// policy read lock, so `cancel` is observed while the batch runs.
    pub async fn generate(
        &self,
        request: &CmacRequest,
        cancel: &CancellationToken,
    ) -> CmacResult<CmacResponse> {
        if request.name.is_empty() {
            return Err(CmacError::InvalidParameter("missing key name".to_string()));
        }

        let owned = request.clone();
        let item_cancel = cancel.clone();
        let parallelism = self.parallelism;
        let result = self
            .store
            .with_read_locked_policy_blocking(&request.name, cancel, move |policy| {
                generate_locked(policy, &owned, &item_cancel, parallelism)
            })
            .await;

        if let Err(e) = &result {
            warn!(key = %request.name, kind = ?e.kind(), error = %e, "CMAC request failed");
        }
        result
    }
}

/// Run the request pipeline against a read-locked policy
fn generate_locked(
    policy: &KeyPolicy,
    request: &CmacRequest,
    cancel: &CancellationToken,
    parallelism: usize,
) -> CmacResult<CmacResponse> {
    check_key_type(policy)?;
    let mac_length = engine::mac_length(request.requested_mac_length())?;
    let default_version = resolve_version(policy, request.key_version)?;

    let items = normalize(request.input.as_deref(), &request.batch_input);
    debug!(
        key = %request.name,
        version = default_version,
        items = items.len(),
        batch = request.is_batch(),
        "Generating CMAC"
    );

    let ctx = BatchContext {
        policy,
        default_version,
        mac_length,
        cancel,
    };
    let outcomes = process_items(&ctx, &items, parallelism)?;
    assemble(&items, outcomes, request.is_batch())
}

/// Reject policies that cannot produce a CMAC
fn check_key_type(policy: &KeyPolicy) -> CmacResult<()> {
    match policy.key_type() {
        KeyType::ManagedKey => Err(CmacError::UnsupportedKeyType(
            "CMAC creation is not supported with managed keys".to_string(),
        )),
        t if t.supports_cmac() => Ok(()),
        t => Err(CmacError::UnsupportedKeyType(format!(
            "key {} is not a supported CMAC key type: {}",
            policy.name(),
            t
        ))),
    }
}
