//! Object storage integration tests
//!
//! **Requirements**:
//! - MinIO or S3 must be running and accessible
//! - S3_ENDPOINT environment variable must be set (e.g., "http://localhost:9000")
//! - Tests will be skipped if S3_ENDPOINT is not configured
//!
//! **Running tests**:
//! ```bash
//! S3_ENDPOINT=http://localhost:9000 S3_PATH_STYLE=true cargo test --test storage_tests
//! ```
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chunkflow_core::storage::{config::StorageConfig, ObjectStorage, S3Storage, StorageOperation};

const TEST_BUCKET: &str = "chunkflow-test";

/// S3 client when an endpoint is configured
async fn setup_storage() -> Option<S3Storage> {
    if std::env::var("S3_ENDPOINT").is_err() {
        return None;
    }

    let config = match StorageConfig::from_env() {
        Ok(cfg) => cfg,
        Err(_) => return None,
    };

    let storage = S3Storage::new(config);
    match storage.ensure_bucket(TEST_BUCKET).await {
        Ok(()) => Some(storage),
        Err(e) => {
            eprintln!("Failed to prepare test bucket: {}", e);
            None
        },
    }
}

fn test_key(test_name: &str) -> String {
    format!("test/{}/{}", test_name, uuid::Uuid::new_v4())
}

#[tokio::test]
async fn test_store_and_extract() {
    let Some(storage) = setup_storage().await else {
        eprintln!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = test_key("store_and_extract");
    let mut source: &[u8] = b"merged upload bytes";

    let stored = storage.store(TEST_BUCKET, &key, &mut source).await.unwrap();
    assert_eq!(stored, 19);

    let mut out = Vec::new();
    let extracted = storage.extract(TEST_BUCKET, &key, &mut out).await.unwrap();
    assert_eq!(extracted, 19);
    assert_eq!(out, b"merged upload bytes");
}

#[tokio::test]
async fn test_extract_missing_object() {
    let Some(storage) = setup_storage().await else {
        eprintln!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = test_key("missing");
    let mut out = Vec::new();
    let err = storage.extract(TEST_BUCKET, &key, &mut out).await.unwrap_err();

    assert_eq!(err.operation, StorageOperation::Extract);
    assert_eq!(err.bucket, TEST_BUCKET);
    assert_eq!(err.key, key);
}
