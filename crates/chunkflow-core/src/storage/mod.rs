//! Durable object storage
//!
//! The transport stage hands finished files to an [`ObjectStorage`] backend.
//! Backends are shared, stateless services: one instance serves every job
//! concurrently. Any transport, credential or missing-object failure surfaces
//! as the single umbrella [`StorageError`]; the stage decides what it means
//! for the job.

pub mod config;
mod memory;
mod s3;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Store,
    Extract,
}

impl std::fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageOperation::Store => f.write_str("store"),
            StorageOperation::Extract => f.write_str("extract"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Storage {operation} failed for {bucket}/{key}: {source}")]
pub struct StorageError {
    pub operation: StorageOperation,
    pub bucket: String,
    pub key: String,
    #[source]
    pub source: anyhow::Error,
}

impl StorageError {
    pub fn new(
        operation: StorageOperation,
        bucket: &str,
        key: &str,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self {
            operation,
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: source.into(),
        }
    }
}

/// "Store bytes under a key, retrieve bytes by key"
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Persist everything readable from `data` under `bucket`/`key`.
    /// Returns the number of bytes stored.
    async fn store(
        &self,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, StorageError>;

    /// Copy the object at `bucket`/`key` into `out`.
    /// Returns the number of bytes written.
    async fn extract(
        &self,
        bucket: &str,
        key: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, StorageError>;
}
