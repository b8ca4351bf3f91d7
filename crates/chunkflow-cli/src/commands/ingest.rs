//! `chunkflow ingest`

use anyhow::{Context, Result};
use chunkflow_common::checksum::compute_bytes_checksum;
use chunkflow_common::types::ChecksumAlgorithm;
use chunkflow_core::config::WorkflowConfig;
use chunkflow_core::fingerprint::{DigestMapper, Mapper};
use chunkflow_core::stages::{
    SliceMergeStage, SliceUploadStage, TransformStage, TransportStage, UploadRequest,
};
use chunkflow_core::storage::{config::StorageConfig, MemoryStorage, ObjectStorage, S3Storage};
use chunkflow_core::workflow::{
    keys, FileStatus, WorkflowContext, WorkflowOrchestrator, WorkflowStage,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::progress::{create_job_progress, format_bytes};
use crate::MapperKind;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub path: PathBuf,
    pub chunk_size: usize,
    pub bucket: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub mapper: MapperKind,
    pub memory: bool,
}

/// Outcome of a finished ingest
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub job_id: Uuid,
    pub status: FileStatus,
    pub bucket: String,
    pub stored_keys: Vec<String>,
    pub checksum: Option<String>,
}

pub async fn run(options: IngestOptions) -> Result<IngestReport> {
    if options.chunk_size == 0 {
        anyhow::bail!("Chunk size must be greater than 0");
    }

    let mut config = WorkflowConfig::load().context("Failed to load workflow configuration")?;
    if let Some(bucket) = &options.bucket {
        config.bucket = bucket.clone();
    }
    if let Some(work_dir) = &options.work_dir {
        config.work_dir = work_dir.clone();
    }
    config.validate()?;

    let storage = open_storage(&config.bucket, options.memory).await?;
    let upload = Arc::new(SliceUploadStage::new(config.upload_timeout()));
    let stages: Vec<Arc<dyn WorkflowStage>> = vec![
        upload.clone(),
        Arc::new(SliceMergeStage::new()),
        Arc::new(TransformStage::passthrough()),
        Arc::new(TransportStage::new(storage)),
    ];
    let bucket = config.bucket.clone();
    let work_dir = config.work_dir.clone();
    let orchestrator = Arc::new(WorkflowOrchestrator::new(stages, config)?);

    let size = tokio::fs::metadata(&options.path)
        .await
        .with_context(|| format!("Failed to read {}", options.path.display()))?
        .len();
    let chunk_size = options.chunk_size as u64;
    let slice_count = size.div_ceil(chunk_size).max(1);

    let ctx = Arc::new(WorkflowContext::new());
    let upload_id = ctx.job_id().to_string();
    let mapper = match options.mapper {
        MapperKind::None => Mapper::identity(),
        MapperKind::Sha256 => Mapper::new(DigestMapper::default()),
    };
    let file_name = options
        .path
        .file_name()
        .and_then(|name| name.to_str())
        .context("Input path has no usable file name")?
        .to_string();

    UploadRequest {
        fingerprint: mapper.compute(&upload_id),
        upload_id,
        file_name,
        slice_count,
        slice_dir: work_dir.join(ctx.job_id().to_string()),
    }
    .apply(&ctx)?;
    ctx.set(keys::BUCKET, bucket.as_str());

    info!(
        job_id = %ctx.job_id(),
        path = %options.path.display(),
        size = %format_bytes(size),
        slice_count,
        "Starting ingest"
    );

    orchestrator.begin(&ctx)?;

    let pb = create_job_progress(ctx.status().as_str());
    let poller = {
        let orchestrator = Arc::clone(&orchestrator);
        let ctx = Arc::clone(&ctx);
        let pb = pb.clone();
        tokio::spawn(async move {
            loop {
                let (max, now) = orchestrator.progress(&ctx);
                pb.set_length(max);
                pb.set_position(now);
                pb.set_message(ctx.status().as_str());
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
    };

    let outcome = async {
        send_slices(&upload, &ctx, &options.path, options.chunk_size, slice_count).await?;
        orchestrator.run(&ctx).await.map_err(anyhow::Error::from)
    }
    .await;

    poller.abort();
    pb.finish_and_clear();

    let status = ctx.status();
    match outcome {
        Ok(status) => info!(job_id = %ctx.job_id(), %status, "Ingest complete"),
        Err(e) => {
            warn!(job_id = %ctx.job_id(), %status, error = %e, "Ingest failed");
            // The client side gave up before the pipeline reached a verdict.
            if let Some(failure) = status.failure_state() {
                ctx.transition(failure)?;
                if let Err(cleanup_error) = upload.cleanup(&ctx, false).await {
                    warn!(error = %cleanup_error, "Failed to discard slices");
                }
            }
            return Err(e.context(format!("Job ended in status {}", ctx.status())));
        }
    }

    Ok(IngestReport {
        job_id: ctx.job_id(),
        status,
        bucket,
        stored_keys: ctx
            .get(keys::STORED_KEYS)
            .and_then(|value| value.as_text_list().map(<[String]>::to_vec))
            .unwrap_or_default(),
        checksum: ctx.require_text(keys::CHECKSUM).ok(),
    })
}

async fn open_storage(bucket: &str, memory: bool) -> Result<Arc<dyn ObjectStorage>> {
    if memory {
        info!("Using in-memory object storage");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    let config = StorageConfig::from_env()?;
    info!(endpoint = ?config.endpoint, "Using S3 object storage");
    let storage = S3Storage::new(config);
    storage.ensure_bucket(bucket).await?;
    Ok(Arc::new(storage))
}

/// Play the client: read the file slice by slice and hand each one to the
/// upload stage together with its checksum.
async fn send_slices(
    upload: &SliceUploadStage,
    ctx: &WorkflowContext,
    path: &Path,
    chunk_size: usize,
    slice_count: u64,
) -> Result<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut buffer = Vec::with_capacity(chunk_size);

    for index in 0..slice_count {
        buffer.clear();
        (&mut file)
            .take(chunk_size as u64)
            .read_to_end(&mut buffer)
            .await?;

        let checksum = compute_bytes_checksum(&buffer, ChecksumAlgorithm::Sha256);
        let mut body = buffer.as_slice();
        upload
            .accept_slice(ctx, index, &mut body, Some(checksum.as_str()))
            .await
            .with_context(|| format!("Failed to upload slice {index}"))?;
    }

    Ok(())
}
