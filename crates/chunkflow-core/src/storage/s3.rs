use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, instrument};

use super::config::StorageConfig;
use super::{ObjectStorage, StorageError, StorageOperation};

const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// S3 / MinIO backend
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(config: StorageConfig) -> Self {
        debug!(?config, "Initializing S3 storage");

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "chunkflow-storage",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Create `bucket` unless it already exists
    #[instrument(skip(self))]
    pub async fn ensure_bucket(&self, bucket: &str) -> anyhow::Result<()> {
        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .with_context(|| format!("Failed to create bucket {bucket}"))?;

        info!(bucket, "Created bucket");
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[instrument(skip(self, data))]
    async fn store(
        &self,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, StorageError> {
        let fail = |e: anyhow::Error| StorageError::new(StorageOperation::Store, bucket, key, e);

        let mut buffer = Vec::new();
        data.read_to_end(&mut buffer)
            .await
            .context("Failed to read upload source")
            .map_err(fail)?;
        let size = buffer.len() as u64;

        debug!("Uploading {} bytes to s3://{}/{}", size, bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(CONTENT_TYPE_OCTET_STREAM)
            .body(ByteStream::from(buffer))
            .send()
            .await
            .context("Failed to upload to S3")
            .map_err(fail)?;

        info!(bucket, key, size, "Stored object");
        Ok(size)
    }

    #[instrument(skip(self, out))]
    async fn extract(
        &self,
        bucket: &str,
        key: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, StorageError> {
        let fail = |e: anyhow::Error| StorageError::new(StorageOperation::Extract, bucket, key, e);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("Failed to download from S3")
            .map_err(fail)?;

        let mut body = response.body.into_async_read();
        let copied = tokio::io::copy(&mut body, out)
            .await
            .context("Failed to read S3 response body")
            .map_err(fail)?;

        debug!("Extracted {} bytes from s3://{}/{}", copied, bucket, key);
        Ok(copied)
    }
}
