use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::slice_dir;
use crate::config::PROGRESS_UNIT_HEAVY;
use crate::workflow::{
    default_cleanup, keys, ParamType, StageError, StagePhase, TempFile, WorkflowContext,
    WorkflowStage,
};

pub const OPERATION_NAME: &str = "transform";

const OUTPUT_DIR: &str = "transformed";

const REQUIRED: &[(&str, ParamType)] = &[
    (keys::FILES, ParamType::Files),
    (keys::SLICE_DIR, ParamType::Text),
];

/// Converts one input file into zero or more output files under `out_dir`
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &str;

    async fn transcode(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, StageError>;
}

/// Copies the input unchanged
#[derive(Debug, Clone, Default)]
pub struct PassthroughTranscoder;

#[async_trait]
impl Transcoder for PassthroughTranscoder {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn transcode(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, StageError> {
        let name = input.file_name().ok_or_else(|| {
            StageError::Incomplete(format!("input {} has no file name", input.display()))
        })?;
        let output = out_dir.join(name);
        tokio::fs::copy(input, &output).await?;
        Ok(vec![output])
    }
}

/// Runs every current file through a [`Transcoder`]
pub struct TransformStage {
    transcoder: Arc<dyn Transcoder>,
}

impl TransformStage {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self { transcoder }
    }

    pub fn passthrough() -> Self {
        Self::new(Arc::new(PassthroughTranscoder))
    }
}

impl std::fmt::Debug for TransformStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformStage")
            .field("transcoder", &self.transcoder.name())
            .finish()
    }
}

fn output_dir(ctx: &WorkflowContext) -> Result<PathBuf, StageError> {
    Ok(slice_dir(ctx)?.join(OUTPUT_DIR))
}

#[async_trait]
impl WorkflowStage for TransformStage {
    fn operation_name(&self) -> &str {
        OPERATION_NAME
    }

    fn phase(&self) -> StagePhase {
        StagePhase::Transform
    }

    fn required_parameters(&self) -> &[(&'static str, ParamType)] {
        REQUIRED
    }

    async fn execute(&self, ctx: &WorkflowContext) -> Result<(), StageError> {
        let inputs = ctx.files();
        let out_dir = output_dir(ctx)?;
        tokio::fs::create_dir_all(&out_dir).await?;

        ctx.add_cleanup_files(inputs.iter().cloned());
        ctx.set_progress(inputs.len() as u64 * PROGRESS_UNIT_HEAVY, 0);

        let mut outputs = Vec::new();
        for input in &inputs {
            let produced = self.transcoder.transcode(input.path(), &out_dir).await?;
            debug!(
                transcoder = self.transcoder.name(),
                input = %input.path().display(),
                outputs = produced.len(),
                "Transcoded file"
            );
            outputs.extend(produced.into_iter().map(TempFile::new));
            ctx.advance_progress(PROGRESS_UNIT_HEAVY);
        }

        info!(job_id = %ctx.job_id(), outputs = outputs.len(), "Transform complete");
        ctx.set_files(outputs);
        Ok(())
    }

    /// A failed transform also removes everything it produced
    async fn cleanup(&self, ctx: &WorkflowContext, was_success: bool) -> Result<(), StageError> {
        default_cleanup(ctx)?;

        if !was_success {
            if let Ok(dir) = output_dir(ctx) {
                ctx.add_cleanup_files([TempFile::new(dir)]);
                default_cleanup(ctx)?;
            }
        }

        Ok(())
    }
}
