//! Per-item CMAC processing and response assembly
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


use crate::batch::{BatchItem, InputField};
use crate::engine;
use crate::error::{CmacError, CmacResult};
use crate::request::{BatchResponseItem, CmacResponse};
use armoricore_keys::{resolve_version, KeyPolicy};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Prefix of every encoded MAC value
pub const MAC_VALUE_PREFIX: &str = "vault";

/// Outcome of one batch item: the encoded MAC or the item's error
pub type ItemOutcome = CmacResult<String>;

/// Everything an item needs, borrowed from inside the policy read lock
#[derive(Clone, Copy)]
pub struct BatchContext<'a> {
    pub policy: &'a KeyPolicy,
    /// Already resolved request-wide version
    pub default_version: u32,
    pub mac_length: Option<usize>,
    pub cancel: &'a CancellationToken,
}

/// Encode a MAC as `vault:v<version>:<base64>`
pub fn encode_mac_value(version: u32, mac: &[u8]) -> String {
    format!("{}:v{}:{}", MAC_VALUE_PREFIX, version, STANDARD.encode(mac))
}

/// Resolve, decode and compute a single item
pub fn process_item(ctx: &BatchContext<'_>, item: &BatchItem) -> ItemOutcome {
    if let Some(err) = &item.malformed {
        return Err(err.clone());
    }

    let version = match item.key_version {
        Some(requested) => resolve_version(ctx.policy, requested)?,
        None => ctx.default_version,
    };

    let input = match &item.input {
        InputField::Absent => {
            return Err(CmacError::MissingInput("missing input to process".to_string()))
        }
        InputField::Empty => Vec::new(),
        InputField::Value(encoded) => STANDARD.decode(encoded).map_err(|e| {
            CmacError::InvalidParameter(format!("unable to decode input as base64: {}", e))
        })?,
    };

    let key = ctx.policy.key_material(version).ok_or_else(|| {
        CmacError::Computation(format!(
            "key version {} has no material for key {}",
            version,
            ctx.policy.name()
        ))
    })?;

    let mac = engine::compute(ctx.policy.key_type(), key, &input, ctx.mac_length)?;
    Ok(encode_mac_value(version, &mac))
}

/// Process every item, keeping results at their input index.
///
/// Item failures are captured in the returned outcomes; only cancellation
/// fails the whole call. With `parallelism > 1` the items are split into
/// contiguous chunks computed on scoped threads.
pub fn process_items(
    ctx: &BatchContext<'_>,
    items: &[BatchItem],
    parallelism: usize,
) -> CmacResult<Vec<ItemOutcome>> {
    let workers = parallelism.clamp(1, items.len().max(1));

    let outcomes = if workers == 1 {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            if ctx.cancel.is_cancelled() {
                return Err(CmacError::Cancelled);
            }
            outcomes.push(process_item(ctx, item));
        }
        outcomes
    } else {
        let mut slots: Vec<Option<ItemOutcome>> = (0..items.len()).map(|_| None).collect();
        let chunk = items.len().div_ceil(workers);
        std::thread::scope(|scope| {
            for (chunk_items, chunk_slots) in items.chunks(chunk).zip(slots.chunks_mut(chunk)) {
                scope.spawn(move || {
                    for (item, slot) in chunk_items.iter().zip(chunk_slots) {
                        if ctx.cancel.is_cancelled() {
                            return;
                        }
                        *slot = Some(process_item(ctx, item));
                    }
                });
            }
        });
        if ctx.cancel.is_cancelled() {
            return Err(CmacError::Cancelled);
        }
        slots
            .into_iter()
            .map(|slot| slot.ok_or(CmacError::Cancelled))
            .collect::<CmacResult<Vec<_>>>()?
    };

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    debug!(
        key = ctx.policy.name(),
        items = items.len(),
        failed,
        workers,
        "Batch processed"
    );
    Ok(outcomes)
}

/// Shape the outcomes into the external response.
///
/// Batch requests get one entry per item in input order. A single-input
/// request collapses to `{cmac}`, and its failure becomes the request error.
pub fn assemble(
    items: &[BatchItem],
    outcomes: Vec<ItemOutcome>,
    batch: bool,
) -> CmacResult<CmacResponse> {
    if !batch {
        let single = outcomes.into_iter().next().unwrap_or_else(|| {
            Err(CmacError::MissingInput("missing input for CMAC".to_string()))
        });
        return match single {
            Ok(cmac) => Ok(CmacResponse::Single { cmac }),
            Err(CmacError::MissingInput(_)) => {
                Err(CmacError::MissingInput("missing input for CMAC".to_string()))
            }
            Err(e) => Err(e),
        };
    }

    let batch_results = items
        .iter()
        .zip(outcomes)
        .map(|(item, outcome)| {
            let (cmac, error) = match outcome {
                Ok(cmac) => (Some(cmac), None),
                Err(e) => (None, Some(e.to_string())),
            };
            BatchResponseItem {
                cmac,
                valid: None,
                error,
                reference: item.reference.clone(),
            }
        })
        .collect();
    Ok(CmacResponse::Batch { batch_results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::normalize;
    use armoricore_keys::KeyType;
    use serde_json::json;

    fn policy() -> KeyPolicy {
        let mut policy = KeyPolicy::new("assembler", KeyType::Aes128Cmac, vec![1u8; 16]).unwrap();
        policy.add_version(vec![2u8; 16]).unwrap();
        policy.add_version(vec![3u8; 16]).unwrap();
        policy.set_min_encryption_version(2).unwrap();
        policy
    }

    fn batch(value: serde_json::Value) -> Vec<BatchItem> {
        normalize(None, &serde_json::from_value::<Vec<_>>(value).unwrap())
    }

    #[test]
    fn test_encode_mac_value() {
        assert_eq!(encode_mac_value(7, &[0xde, 0xad, 0xbe, 0xef]), "vault:v7:3q2+7w==");
    }

    #[test]
    fn test_item_versions() {
        let policy = policy();
        let cancel = CancellationToken::new();
        let ctx = BatchContext {
            policy: &policy,
            default_version: 3,
            mac_length: None,
            cancel: &cancel,
        };
        let items = batch(json!([
            {"input": "YQ=="},
            {"input": "YQ==", "key_version": 2},
            {"input": "YQ==", "key_version": 1},
            {"input": "YQ==", "key_version": -1}
        ]));
        let outcomes = process_items(&ctx, &items, 1).unwrap();
        assert!(outcomes[0].as_ref().unwrap().starts_with("vault:v3:"));
        assert!(outcomes[1].as_ref().unwrap().starts_with("vault:v2:"));
        assert!(matches!(outcomes[2], Err(CmacError::InvalidVersion(_))));
        assert!(matches!(outcomes[3], Err(CmacError::InvalidVersion(_))));
    }

    #[test]
    fn test_bad_base64_is_item_error() {
        let policy = policy();
        let cancel = CancellationToken::new();
        let ctx = BatchContext {
            policy: &policy,
            default_version: 3,
            mac_length: None,
            cancel: &cancel,
        };
        let items = batch(json!([{"input": "not base64!"}, {"input": ""}]));
        let outcomes = process_items(&ctx, &items, 1).unwrap();
        assert!(matches!(outcomes[0], Err(CmacError::InvalidParameter(_))));
        assert!(outcomes[1].is_ok());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let policy = policy();
        let cancel = CancellationToken::new();
        let ctx = BatchContext {
            policy: &policy,
            default_version: 3,
            mac_length: Some(8),
            cancel: &cancel,
        };
        let raw: Vec<_> = (0..37)
            .map(|i| {
                let reference = format!("r{}", i);
                let input = STANDARD.encode(format!("item {}", i));
                match i % 5 {
                    0 => json!({"reference": reference}),
                    1 => json!({"input": "", "reference": reference}),
                    2 => json!({"input": input, "key_version": 2, "reference": reference}),
                    _ => json!({"input": input, "reference": reference}),
                }
            })
            .collect();
        let items = batch(json!(raw));

        let sequential = process_items(&ctx, &items, 1).unwrap();
        for workers in [2, 4, 64] {
            assert_eq!(process_items(&ctx, &items, workers).unwrap(), sequential);
        }
    }

    #[test]
    fn test_cancelled_batch_has_no_partial_result() {
        let policy = policy();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = BatchContext {
            policy: &policy,
            default_version: 3,
            mac_length: None,
            cancel: &cancel,
        };
        let items = batch(json!([{"input": ""}, {"input": ""}, {"input": ""}]));
        assert_eq!(process_items(&ctx, &items, 1), Err(CmacError::Cancelled));
        assert_eq!(process_items(&ctx, &items, 3), Err(CmacError::Cancelled));
    }

    #[test]
    fn test_assemble_single_collapses() {
        let items = normalize(Some("YQ=="), &[]);
        let response = assemble(&items, vec![Ok("vault:v1:xyz".to_string())], false).unwrap();
        assert_eq!(response.cmac(), Some("vault:v1:xyz"));

        let items = normalize(None, &[]);
        let err = assemble(
            &items,
            vec![Err(CmacError::MissingInput("missing input to process".to_string()))],
            false,
        )
        .unwrap_err();
        assert_eq!(err, CmacError::MissingInput("missing input for CMAC".to_string()));
    }

    #[test]
    fn test_assemble_batch_keeps_references() {
        let items = batch(json!([
            {"input": "", "reference": "first"},
            {"reference": "second"}
        ]));
        let outcomes = vec![
            Ok("vault:v1:aaa".to_string()),
            Err(CmacError::MissingInput("missing input to process".to_string())),
        ];
        let response = assemble(&items, outcomes, true).unwrap();
        let results = response.batch_results().unwrap();
        assert_eq!(results[0].cmac.as_deref(), Some("vault:v1:aaa"));
        assert_eq!(results[0].reference.as_deref(), Some("first"));
        assert_eq!(results[1].cmac, None);
        assert_eq!(results[1].error.as_deref(), Some("missing input to process"));
        assert_eq!(results[1].reference.as_deref(), Some("second"));
    }
}
