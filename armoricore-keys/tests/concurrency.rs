//! Concurrent access to a single key policy

use armoricore_keys::{
    local_store::LocalPolicyStorage, KeyError, KeyPolicy, KeyType, PolicyStore,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Material for version `v` is `v` repeated, so readers can check that the
/// material they see belongs to the version they resolved.
fn material(version: u32) -> Vec<u8> {
    vec![version as u8; 16]
}

async fn local_store(dir: &TempDir) -> Arc<PolicyStore> {
    let storage = LocalPolicyStorage::new(dir.path(), Some(&[3u8; 32]))
        .await
        .expect("Failed to open storage");
    let store = Arc::new(PolicyStore::new(Arc::new(storage)));
    store
        .create(KeyPolicy::new("shared", KeyType::Aes128Cmac, material(1)).unwrap())
        .await
        .unwrap();
    store
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_consistent_snapshots_during_rotation() {
    let dir = TempDir::new().unwrap();
    let store = local_store(&dir).await;
    let cancel = CancellationToken::new();

    let mut readers = Vec::new();
    for _ in 0..32 {
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        readers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..20 {
                let observed = store
                    .with_read_locked_policy("shared", &cancel, |policy| {
                        let latest = policy.latest_version();
                        let key = policy.key_material(latest).map(<[u8]>::to_vec);
                        Ok::<_, KeyError>((latest, key))
                    })
                    .await
                    .unwrap();
                seen.push(observed);
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    let rotator = {
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            for v in 2..=10 {
                assert_eq!(store.rotate("shared", material(v), &cancel).await.unwrap(), v);
            }
        })
    };

    rotator.await.unwrap();
    for reader in readers {
        let seen = reader.await.unwrap();
        assert_eq!(seen.len(), 20);
        let mut previous = 0;
        for (latest, key) in seen {
            assert_eq!(key, Some(material(latest)));
            // A single reader never observes the version going backwards.
            assert!(latest >= previous);
            previous = latest;
        }
    }

    let reopened = LocalPolicyStorage::new(dir.path(), Some(&[3u8; 32])).await.unwrap();
    let store = PolicyStore::new(Arc::new(reopened));
    let latest = store
        .with_read_locked_policy("shared", &cancel, |p| Ok::<_, KeyError>(p.latest_version()))
        .await
        .unwrap();
    assert_eq!(latest, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rotation_waits_for_in_flight_reader() {
    let dir = TempDir::new().unwrap();
    let store = local_store(&dir).await;
    let cancel = CancellationToken::new();
    let reader_started = Arc::new(AtomicBool::new(false));

    let reader = {
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        let started = Arc::clone(&reader_started);
        tokio::spawn(async move {
            store
                .with_read_locked_policy("shared", &cancel, |policy| {
                    started.store(true, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(100));
                    Ok::<_, KeyError>((policy.latest_version(), Instant::now()))
                })
                .await
                .unwrap()
        })
    };

    while !reader_started.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    store.rotate("shared", material(2), &cancel).await.unwrap();
    let rotated_at = Instant::now();

    let (observed, released_at) = reader.await.unwrap();
    assert_eq!(observed, 1);
    assert!(rotated_at >= released_at);
}
