//! Load Tests for CMAC generation
//!
//! These tests simulate high load scenarios:
//! - Many concurrent requests against one key
//! - Rotation while requests are in flight
//! - Large batches
//!
//! Run with: cargo test --test load_test --release

use armoricore_keys::{KeyPolicy, KeyType, MemoryPolicyStorage, PolicyStore};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use transit_cmac::{CmacHandler, CmacRequest, CmacResponse};

async fn shared_handler() -> (Arc<CmacHandler>, Arc<PolicyStore>) {
    let store = Arc::new(PolicyStore::new(Arc::new(MemoryPolicyStorage::new())));
    store
        .create(KeyPolicy::new("hot", KeyType::Aes128Cmac, vec![1u8; 16]).unwrap())
        .await
        .unwrap();
    let handler = Arc::new(CmacHandler::new(Arc::clone(&store)).with_parallelism(2));
    (handler, store)
}

fn version_of(cmac: &str) -> u32 {
    cmac.split(':')
        .nth(1)
        .and_then(|v| v.strip_prefix('v'))
        .and_then(|v| v.parse().ok())
        .expect("malformed MAC value")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_requests_during_rotation() {
    let (handler, store) = shared_handler().await;
    let cancel = CancellationToken::new();
    let num_requests = 500;

    let start = Instant::now();

    let requests = (0..num_requests).map(|i| {
        let handler = Arc::clone(&handler);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let batch: Vec<_> = (0..4)
                .map(|j| {
                    let tag = format!("{}-{}", i, j);
                    json!({"input": STANDARD.encode(&tag), "reference": tag})
                })
                .collect();
            let request = CmacRequest::new("hot")
                .with_batch(serde_json::from_value(json!(batch)).unwrap());
            handler.generate(&request, &cancel).await
        })
    });
    let requests: Vec<_> = requests.collect();

    let rotator = {
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            for v in 2..=20u8 {
                store.rotate("hot", vec![v; 16], &cancel).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let results = join_all(requests).await;
    rotator.await.unwrap();
    let elapsed = start.elapsed();

    for (i, joined) in results.into_iter().enumerate() {
        let response = joined.unwrap().expect("request failed");
        let CmacResponse::Batch { batch_results } = response else {
            panic!("expected batch response");
        };
        assert_eq!(batch_results.len(), 4);

        // Every item of one request is computed under the same snapshot.
        let versions: Vec<u32> = batch_results
            .iter()
            .map(|r| version_of(r.cmac.as_deref().unwrap()))
            .collect();
        assert!(versions.iter().all(|v| *v == versions[0]));

        for (j, result) in batch_results.iter().enumerate() {
            assert_eq!(result.reference, Some(format!("{}-{}", i, j)));
        }
    }

    println!("✅ Served {} requests in {:?} during 19 rotations", num_requests, elapsed);
}

#[tokio::test]
async fn test_large_batch_throughput() {
    let (handler, _store) = shared_handler().await;
    let batch: Vec<_> = (0..10_000)
        .map(|i| {
            json!({"input": STANDARD.encode(format!("item {}", i)), "reference": i.to_string()})
        })
        .collect();
    let request = CmacRequest::new("hot").with_batch(serde_json::from_value(json!(batch)).unwrap());

    let start = Instant::now();
    let response = handler.generate(&request, &CancellationToken::new()).await.unwrap();
    let elapsed = start.elapsed();

    let results = response.batch_results().unwrap();
    assert_eq!(results.len(), 10_000);
    assert!(results.iter().all(|r| r.error.is_none()));
    assert_eq!(results[9_999].reference.as_deref(), Some("9999"));

    let items_per_second = 10_000f64 / elapsed.as_secs_f64();
    println!("✅ Throughput: {:.2} items/second", items_per_second);
}
