use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ObjectStorage, StorageError, StorageOperation};

/// Process-local backend for tests and dry runs
#[derive(Debug)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    stores_before_failure: AtomicUsize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            stores_before_failure: AtomicUsize::new(usize::MAX),
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the next `count` stores succeed, then fail every store after that
    pub fn fail_after(&self, count: usize) {
        self.stores_before_failure.store(count, Ordering::SeqCst);
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn take_store_permit(&self) -> bool {
        self.stores_before_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn store(
        &self,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, StorageError> {
        if !self.take_store_permit() {
            return Err(StorageError::new(
                StorageOperation::Store,
                bucket,
                key,
                anyhow::anyhow!("injected store failure"),
            ));
        }

        let mut buffer = Vec::new();
        data.read_to_end(&mut buffer)
            .await
            .map_err(|e| StorageError::new(StorageOperation::Store, bucket, key, e))?;
        let size = buffer.len() as u64;

        debug!(bucket, key, size, "Stored object in memory");
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), buffer);

        Ok(size)
    }

    async fn extract(
        &self,
        bucket: &str,
        key: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, StorageError> {
        let fail = |e: anyhow::Error| StorageError::new(StorageOperation::Extract, bucket, key, e);

        let data = self
            .get(bucket, key)
            .await
            .ok_or_else(|| fail(anyhow::anyhow!("object not found")))?;

        out.write_all(&data).await.map_err(|e| fail(e.into()))?;
        out.flush().await.map_err(|e| fail(e.into()))?;

        Ok(data.len() as u64)
    }
}
