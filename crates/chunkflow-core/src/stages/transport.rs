use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::slice_dir;
use crate::config::PROGRESS_UNIT_HEAVY;
use crate::storage::ObjectStorage;
use crate::workflow::{
    keys, ParamType, ParamValue, StageError, StagePhase, TempFile, WorkflowContext, WorkflowStage,
};

pub const OPERATION_NAME: &str = "transport-minio";

const REQUIRED: &[(&str, ParamType)] = &[
    (keys::FILES, ParamType::Files),
    (keys::FINGERPRINT, ParamType::Fingerprint),
    (keys::BUCKET, ParamType::Text),
];

/// Moves finished files into object storage under `{prefix}{fingerprint}/{file_name}`
pub struct TransportStage {
    storage: Arc<dyn ObjectStorage>,
}

impl TransportStage {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

impl std::fmt::Debug for TransportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportStage").finish_non_exhaustive()
    }
}

pub fn object_key(prefix: &str, fingerprint: &str, file_name: &str) -> String {
    format!("{prefix}{fingerprint}/{file_name}")
}

#[async_trait]
impl WorkflowStage for TransportStage {
    fn operation_name(&self) -> &str {
        OPERATION_NAME
    }

    fn phase(&self) -> StagePhase {
        StagePhase::Transport
    }

    fn required_parameters(&self) -> &[(&'static str, ParamType)] {
        REQUIRED
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id()))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<(), StageError> {
        let files = ctx.files();
        let fingerprint = ctx.require_fingerprint(keys::FINGERPRINT)?;
        let bucket = ctx.require_text(keys::BUCKET)?;
        let prefix = ctx
            .get(keys::OBJECT_PREFIX)
            .and_then(|value| value.as_text().map(str::to_string))
            .unwrap_or_default();

        // Local copies go away whatever happens to the upload.
        ctx.add_cleanup_files(files.iter().cloned());
        if let Ok(dir) = slice_dir(ctx) {
            ctx.add_cleanup_files([TempFile::new(dir)]);
        }

        ctx.set_progress(files.len() as u64 * PROGRESS_UNIT_HEAVY, 0);

        let mut stored_keys = Vec::with_capacity(files.len());
        for file in &files {
            let file_name = file.file_name().ok_or_else(|| {
                StageError::Incomplete(format!("{} has no file name", file.path().display()))
            })?;
            let key = object_key(&prefix, fingerprint.as_str(), file_name);

            let mut source = tokio::fs::File::open(file.path()).await?;
            let size = self.storage.store(&bucket, &key, &mut source).await?;

            debug!(bucket = %bucket, key = %key, size, "Transported file");
            stored_keys.push(key);
            ctx.advance_progress(PROGRESS_UNIT_HEAVY);
        }

        info!(bucket = %bucket, objects = stored_keys.len(), "Transport complete");
        ctx.set(keys::STORED_KEYS, ParamValue::TextList(stored_keys));
        ctx.set_files(Vec::new());
        Ok(())
    }
}
