//! Shared helpers for chunkflow-core integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chunkflow_core::config::WorkflowConfig;
use chunkflow_core::fingerprint::Mapper;
use chunkflow_core::stages::{
    SliceMergeStage, SliceUploadStage, TransformStage, TransportStage, UploadRequest,
};
use chunkflow_core::storage::ObjectStorage;
use chunkflow_core::workflow::{
    ParamType, StageError, StagePhase, TempFile, WorkflowContext, WorkflowOrchestrator,
    WorkflowStage,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const UPLOAD_ID: &str = "8d6b5f5a-dc3b-4513-b504-e4de2d594751";

/// Test stage that records how the orchestrator drives it
pub struct RecordingStage {
    name: String,
    phase: StagePhase,
    required: Vec<(&'static str, ParamType)>,
    fail_execute: bool,
    chunk_dir: Option<PathBuf>,
    chunk_count: usize,
    extra_cleanup: Vec<TempFile>,
    executions: AtomicUsize,
    cleanups: Mutex<Vec<bool>>,
}

impl RecordingStage {
    pub fn new(name: &str, phase: StagePhase) -> Self {
        Self {
            name: name.to_string(),
            phase,
            required: Vec::new(),
            fail_execute: false,
            chunk_dir: None,
            chunk_count: 0,
            extra_cleanup: Vec::new(),
            executions: AtomicUsize::new(0),
            cleanups: Mutex::new(Vec::new()),
        }
    }

    pub fn requiring(mut self, key: &'static str, param_type: ParamType) -> Self {
        self.required.push((key, param_type));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    /// Write `count` temp chunk files into `dir` on execute and register them
    pub fn writing_chunks(mut self, dir: &Path, count: usize) -> Self {
        self.chunk_dir = Some(dir.to_path_buf());
        self.chunk_count = count;
        self
    }

    /// Register an extra cleanup entry on execute
    pub fn registering(mut self, file: TempFile) -> Self {
        self.extra_cleanup.push(file);
        self
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> Vec<bool> {
        self.cleanups.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowStage for RecordingStage {
    fn operation_name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> StagePhase {
        self.phase
    }

    fn required_parameters(&self) -> &[(&'static str, ParamType)] {
        &self.required
    }

    async fn execute(&self, ctx: &WorkflowContext) -> Result<(), StageError> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if let Some(dir) = &self.chunk_dir {
            for i in 0..self.chunk_count {
                let path = dir.join(format!("chunk-{i}.part"));
                tokio::fs::write(&path, format!("chunk {i}")).await?;
                ctx.add_cleanup_files([TempFile::new(path)]);
            }
        }
        ctx.add_cleanup_files(self.extra_cleanup.iter().cloned());

        if self.fail_execute {
            return Err(StageError::Incomplete("forced failure".to_string()));
        }
        Ok(())
    }

    async fn cleanup(&self, ctx: &WorkflowContext, was_success: bool) -> Result<(), StageError> {
        self.cleanups.lock().unwrap().push(was_success);
        chunkflow_core::workflow::default_cleanup(ctx)
    }
}

/// A path whose deletion fails with something other than "not found"
pub fn undeletable(dir: &Path) -> TempFile {
    let file = dir.join("plain-file");
    std::fs::write(&file, b"x").unwrap();
    TempFile::new(file.join("child"))
}

pub fn test_config(work_dir: &Path) -> WorkflowConfig {
    WorkflowConfig {
        work_dir: work_dir.to_path_buf(),
        upload_timeout_secs: 60,
        ..WorkflowConfig::default()
    }
}

/// The four reference stages over `storage`
pub fn reference_pipeline(
    storage: Arc<dyn ObjectStorage>,
    config: WorkflowConfig,
) -> WorkflowOrchestrator {
    let stages: Vec<Arc<dyn WorkflowStage>> = vec![
        Arc::new(SliceUploadStage::new(config.upload_timeout())),
        Arc::new(SliceMergeStage::new()),
        Arc::new(TransformStage::passthrough()),
        Arc::new(TransportStage::new(storage)),
    ];
    WorkflowOrchestrator::new(stages, config).unwrap()
}

/// Fresh context seeded for an upload of `slice_count` slices
pub fn upload_job(work_dir: &Path, slice_count: u64, bucket: &str) -> WorkflowContext {
    upload_job_named(work_dir, slice_count, bucket, "payload.bin")
}

/// Like [`upload_job`], with a client-chosen file name
pub fn upload_job_named(
    work_dir: &Path,
    slice_count: u64,
    bucket: &str,
    file_name: &str,
) -> WorkflowContext {
    let ctx = WorkflowContext::new();
    UploadRequest {
        upload_id: UPLOAD_ID.to_string(),
        fingerprint: Mapper::identity().compute(UPLOAD_ID),
        file_name: file_name.to_string(),
        slice_count,
        slice_dir: work_dir.join(ctx.job_id().to_string()),
    }
    .apply(&ctx)
    .unwrap();
    ctx.set(chunkflow_core::workflow::keys::BUCKET, bucket);
    ctx
}

pub fn upload_timeout() -> Duration {
    Duration::from_secs(60)
}
