use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chunkflow_common::checksum::verify_file_checksum;
use chunkflow_common::types::ChecksumAlgorithm;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use super::{checked_file_name, slice_dir};
use crate::config::{MAX_SLICE_COUNT, PROGRESS_UNIT_LIGHT};
use crate::fingerprint::Fingerprint;
use crate::workflow::{
    default_cleanup, keys, FileStatus, ParamType, StageError, StagePhase, TempFile, WorkflowContext,
    WorkflowStage,
};

pub const OPERATION_NAME: &str = "upload-slice";

const MISSING_REPORT_LIMIT: usize = 16;

const REQUIRED: &[(&str, ParamType)] = &[
    (keys::UPLOAD_ID, ParamType::Text),
    (keys::FINGERPRINT, ParamType::Fingerprint),
    (keys::SLICE_DIR, ParamType::Text),
    (keys::SLICE_COUNT, ParamType::Integer),
    (keys::LAST_ACTIVE_AT, ParamType::Timestamp),
];

/// Everything the upload stage needs to know about a new job
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub upload_id: String,
    pub fingerprint: Fingerprint,
    pub file_name: String,
    pub slice_count: u64,
    /// Scratch directory owned by this job
    pub slice_dir: PathBuf,
}

impl UploadRequest {
    /// Seed a fresh context with this request.
    ///
    /// The file name is reduced to its last path component. Nothing is
    /// written to the context when the name or slice count is rejected.
    pub fn apply(self, ctx: &WorkflowContext) -> Result<(), StageError> {
        let file_name = checked_file_name(&self.file_name)?;
        let slice_count = checked_slice_count(self.slice_count)?;

        ctx.set(keys::UPLOAD_ID, self.upload_id);
        ctx.set(keys::FINGERPRINT, self.fingerprint);
        ctx.set(keys::FILE_NAME, file_name);
        ctx.set(keys::SLICE_COUNT, slice_count);
        ctx.set(keys::SLICE_DIR, self.slice_dir.to_string_lossy().into_owned());
        ctx.set(keys::LAST_ACTIVE_AT, Utc::now());
        Ok(())
    }
}

fn checked_slice_count(count: u64) -> Result<i64, StageError> {
    if count > MAX_SLICE_COUNT {
        return Err(StageError::invalid_parameter(
            keys::SLICE_COUNT,
            format!("{count} exceeds the limit of {MAX_SLICE_COUNT} slices"),
        ));
    }
    i64::try_from(count).map_err(|_| {
        StageError::invalid_parameter(keys::SLICE_COUNT, format!("{count} is out of range"))
    })
}

/// Receives client slices into the job's slice directory.
///
/// Slices arrive through [`accept_slice`](Self::accept_slice) across many
/// client round trips; `execute` runs once the client says it is done and
/// checks that nothing is missing.
#[derive(Debug, Clone)]
pub struct SliceUploadStage {
    timeout: Duration,
}

impl SliceUploadStage {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Receive slice `index`.
    ///
    /// The body is spooled to a `.part` file registered for cleanup, checked
    /// against `checksum` when one is given, then promoted to its final
    /// `.slice` name.
    #[instrument(skip(self, ctx, data, checksum), fields(job_id = %ctx.job_id()))]
    pub async fn accept_slice(
        &self,
        ctx: &WorkflowContext,
        index: u64,
        data: &mut (dyn AsyncRead + Unpin + Send),
        checksum: Option<&str>,
    ) -> Result<TempFile, StageError> {
        let status = ctx.status();
        if status != FileStatus::UploadingSlice {
            return Err(StageError::Other(anyhow::anyhow!(
                "job is not accepting slices (status {status})"
            )));
        }

        let count = slice_count(ctx)?;
        if index >= count {
            return Err(StageError::Incomplete(format!(
                "slice {index} is out of range, upload has {count} slices"
            )));
        }

        let dir = slice_dir(ctx)?;
        tokio::fs::create_dir_all(&dir).await?;

        let part = TempFile::new(dir.join(format!("{index:06}.part")));
        ctx.add_cleanup_files([part.clone()]);

        let mut file = tokio::fs::File::create(part.path()).await?;
        let written = tokio::io::copy(data, &mut file).await?;
        file.flush().await?;
        drop(file);

        if let Some(expected) = checksum {
            let path = part.path().to_path_buf();
            let expected = expected.to_string();
            tokio::task::spawn_blocking(move || {
                verify_file_checksum(path, &expected, ChecksumAlgorithm::Sha256)
            })
            .await
            .map_err(anyhow::Error::from)??;
        }

        let slice = slice_path(&dir, index);
        tokio::fs::rename(part.path(), &slice).await?;

        ctx.set(keys::LAST_ACTIVE_AT, Utc::now());
        let received = ctx.insert_index(keys::RECEIVED_SLICES, index);
        ctx.set_progress(count * PROGRESS_UNIT_LIGHT, received * PROGRESS_UNIT_LIGHT);

        debug!(index, written, received, count, "Accepted slice");
        Ok(TempFile::new(slice))
    }
}

impl Default for SliceUploadStage {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_UPLOAD_TIMEOUT_SECS))
    }
}

fn slice_count(ctx: &WorkflowContext) -> Result<u64, StageError> {
    let count = ctx.require_integer(keys::SLICE_COUNT)?;
    match u64::try_from(count) {
        Ok(count) if count <= MAX_SLICE_COUNT => Ok(count),
        _ => Err(StageError::invalid_parameter(
            keys::SLICE_COUNT,
            format!("{count} is not between 0 and {MAX_SLICE_COUNT}"),
        )),
    }
}

fn slice_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{index:06}.slice"))
}

#[async_trait]
impl WorkflowStage for SliceUploadStage {
    fn operation_name(&self) -> &str {
        OPERATION_NAME
    }

    fn phase(&self) -> StagePhase {
        StagePhase::Upload
    }

    fn required_parameters(&self) -> &[(&'static str, ParamType)] {
        REQUIRED
    }

    async fn execute(&self, ctx: &WorkflowContext) -> Result<(), StageError> {
        let count = slice_count(ctx)?;
        if count == 0 {
            return Err(StageError::Incomplete("upload has no slices".to_string()));
        }

        let dir = slice_dir(ctx)?;
        let received = ctx.indices(keys::RECEIVED_SLICES);
        if received.len() as u64 != count {
            let missing: Vec<u64> = (0..count)
                .filter(|i| !received.contains(i))
                .take(MISSING_REPORT_LIMIT)
                .collect();
            return Err(StageError::Incomplete(format!(
                "{} of {count} slices missing, first {missing:?}",
                count.saturating_sub(received.len() as u64)
            )));
        }

        let slices: Vec<TempFile> = (0..count).map(|i| TempFile::new(slice_path(&dir, i))).collect();
        ctx.set_progress(count * PROGRESS_UNIT_LIGHT, count * PROGRESS_UNIT_LIGHT);
        ctx.set_files(slices);

        info!(job_id = %ctx.job_id(), count, "All slices received");
        Ok(())
    }

    /// A cancelled or failed upload also drops every received slice
    async fn cleanup(&self, ctx: &WorkflowContext, was_success: bool) -> Result<(), StageError> {
        default_cleanup(ctx)?;

        if !was_success {
            if let Ok(dir) = slice_dir(ctx) {
                warn!(job_id = %ctx.job_id(), dir = %dir.display(), "Discarding received slices");
                ctx.set_files(Vec::new());
                ctx.remove(keys::RECEIVED_SLICES);
                ctx.add_cleanup_files([TempFile::new(dir)]);
                default_cleanup(ctx)?;
            }
        }

        Ok(())
    }

    fn should_check_timeout(&self, ctx: &WorkflowContext, _now: DateTime<Utc>) -> bool {
        ctx.timestamp(keys::LAST_ACTIVE_AT).is_some()
    }

    fn is_timed_out(&self, ctx: &WorkflowContext, now: DateTime<Utc>) -> bool {
        let Some(last_active) = ctx.timestamp(keys::LAST_ACTIVE_AT) else {
            return false;
        };
        let Ok(timeout) = chrono::Duration::from_std(self.timeout) else {
            return false;
        };
        now - last_active > timeout
    }
}
