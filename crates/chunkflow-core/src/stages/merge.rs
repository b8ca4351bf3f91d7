use async_trait::async_trait;
use chunkflow_common::checksum::compute_file_checksum;
use chunkflow_common::types::ChecksumAlgorithm;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{checked_file_name, slice_dir};
use crate::config::PROGRESS_UNIT_LIGHT;
use crate::workflow::{
    default_cleanup, keys, ParamType, StageError, StagePhase, TempFile, WorkflowContext,
    WorkflowStage,
};

pub const OPERATION_NAME: &str = "merge-slice";

/// Subdirectory of the slice directory owned by the merge stage
const OUTPUT_DIR: &str = "merged";

const REQUIRED: &[(&str, ParamType)] = &[
    (keys::FILES, ParamType::Files),
    (keys::SLICE_DIR, ParamType::Text),
    (keys::FILE_NAME, ParamType::Text),
];

/// Concatenates the uploaded slices, in order, into one file
#[derive(Debug, Clone, Default)]
pub struct SliceMergeStage;

impl SliceMergeStage {
    pub fn new() -> Self {
        Self
    }
}

fn output_dir(ctx: &WorkflowContext) -> Result<PathBuf, StageError> {
    Ok(slice_dir(ctx)?.join(OUTPUT_DIR))
}

fn merged_path(ctx: &WorkflowContext) -> Result<PathBuf, StageError> {
    let name = checked_file_name(&ctx.require_text(keys::FILE_NAME)?)?;
    Ok(output_dir(ctx)?.join(name))
}

#[async_trait]
impl WorkflowStage for SliceMergeStage {
    fn operation_name(&self) -> &str {
        OPERATION_NAME
    }

    fn phase(&self) -> StagePhase {
        StagePhase::Merge
    }

    fn required_parameters(&self) -> &[(&'static str, ParamType)] {
        REQUIRED
    }

    async fn execute(&self, ctx: &WorkflowContext) -> Result<(), StageError> {
        let slices = ctx.files();
        let output = merged_path(ctx)?;

        ctx.add_cleanup_files(slices.iter().cloned());
        ctx.set_progress(slices.len() as u64 * PROGRESS_UNIT_LIGHT, 0);

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut merged = tokio::fs::File::create(&output).await?;
        for slice in &slices {
            let mut input = tokio::fs::File::open(slice.path()).await?;
            let copied = tokio::io::copy(&mut input, &mut merged).await?;
            ctx.advance_progress(PROGRESS_UNIT_LIGHT);
            debug!(path = %slice.path().display(), copied, "Merged slice");
        }
        merged.flush().await?;
        drop(merged);

        let path = output.clone();
        let checksum = tokio::task::spawn_blocking(move || {
            compute_file_checksum(path, ChecksumAlgorithm::Sha256)
        })
        .await
        .map_err(anyhow::Error::from)??;

        info!(
            job_id = %ctx.job_id(),
            slices = slices.len(),
            path = %output.display(),
            checksum = %checksum,
            "Slices merged"
        );

        ctx.set(keys::CHECKSUM, checksum);
        ctx.set_files(vec![TempFile::new(output)]);
        Ok(())
    }

    /// A failed merge also removes its partial output
    async fn cleanup(&self, ctx: &WorkflowContext, was_success: bool) -> Result<(), StageError> {
        default_cleanup(ctx)?;

        if !was_success {
            if let Ok(dir) = output_dir(ctx) {
                match TempFile::new(&dir).delete() {
                    Ok(()) => debug!(path = %dir.display(), "Removed partial merge output"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(source) => return Err(StageError::Cleanup { path: dir, source }),
                }
            }
        }

        Ok(())
    }
}
