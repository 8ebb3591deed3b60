//! End-to-end CMAC generation against encrypted on-disk policies
//!
//! Exercises the full path a host takes: open the local policy store,
//! seed and rotate a key, then serve JSON requests.

use armoricore_keys::{init_policy_store, KeyPolicy, KeyType};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use transit_cmac::{CmacHandler, CmacRequest};

const MASTER_KEY: [u8; 32] = [0x5a; 32];

#[tokio::test]
async fn test_batch_request_survives_restart() {
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();

    let first_response = {
        let store = init_policy_store(dir.path(), Some(&MASTER_KEY)).await.unwrap();
        store
            .create(KeyPolicy::new("payments", KeyType::Aes256Cmac, vec![0x11; 32]).unwrap())
            .await
            .unwrap();
        store.rotate("payments", vec![0x22; 32], &cancel).await.unwrap();

        let request: CmacRequest = serde_json::from_value(json!({
            "name": "payments",
            "batch_input": [
                {"input": "aGVsbG8=", "reference": "v-latest"},
                {"input": "aGVsbG8=", "key_version": 1, "reference": "v-one"},
                {"reference": "no-input"}
            ]
        }))
        .unwrap();
        CmacHandler::new(store).generate(&request, &cancel).await.unwrap()
    };

    // A fresh store over the same directory reproduces the same MACs.
    let store = init_policy_store(dir.path(), Some(&MASTER_KEY)).await.unwrap();
    assert_eq!(store.list_keys().await.unwrap(), vec!["payments"]);

    let request: CmacRequest = serde_json::from_value(json!({
        "name": "payments",
        "batch_input": [
            {"input": "aGVsbG8=", "reference": "v-latest"},
            {"input": "aGVsbG8=", "key_version": 1, "reference": "v-one"},
            {"reference": "no-input"}
        ]
    }))
    .unwrap();
    let second_response = CmacHandler::new(store).generate(&request, &cancel).await.unwrap();
    assert_eq!(first_response, second_response);

    let value = serde_json::to_value(&second_response).unwrap();
    let results = value["batch_results"].as_array().unwrap();
    assert!(results[0]["cmac"].as_str().unwrap().starts_with("vault:v2:"));
    assert!(results[1]["cmac"].as_str().unwrap().starts_with("vault:v1:"));
    assert_ne!(results[0]["cmac"], results[1]["cmac"]);
    assert_eq!(results[2]["error"], "missing input to process");
    assert_eq!(results[2]["reference"], "no-input");
}

#[tokio::test]
async fn test_wrong_master_key_is_storage_error() {
    let dir = TempDir::new().unwrap();
    let store = init_policy_store(dir.path(), Some(&MASTER_KEY)).await.unwrap();
    store
        .create(KeyPolicy::new("sealed", KeyType::Aes128Cmac, vec![0x33; 16]).unwrap())
        .await
        .unwrap();

    let other = init_policy_store(dir.path(), Some(&[0u8; 32])).await.unwrap();
    let err = CmacHandler::new(other)
        .generate(&CmacRequest::new("sealed").with_input(""), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), transit_cmac::ErrorKind::Storage);
}
