//! Workflow orchestrator
//!
//! Walks one job's context through the configured stages, one stage at a
//! time, and owns every status transition. For each stage it runs the
//! readiness check, `execute`, then `cleanup` exactly once with the outcome,
//! and only then lets the next stage look at the context.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::context::WorkflowContext;
use super::error::{StageError, WorkflowError};
use super::registry::StageRegistry;
use super::stage::WorkflowStage;
use super::status::{FileStatus, StagePhase};
use crate::config::{CleanupPolicy, WorkflowConfig};

pub struct WorkflowOrchestrator {
    registry: StageRegistry,
    config: WorkflowConfig,
}

impl WorkflowOrchestrator {
    /// Build a pipeline from stages listed in phase order.
    ///
    /// Fails on empty or duplicate operation names and on stages whose
    /// phases are out of order.
    pub fn new(
        stages: Vec<Arc<dyn WorkflowStage>>,
        config: WorkflowConfig,
    ) -> Result<Self, WorkflowError> {
        let registry = StageRegistry::new(stages)?;

        let mut previous: Option<StagePhase> = None;
        for stage in registry.iter() {
            let phase = stage.phase();
            if let Some(after) = previous {
                if phase <= after {
                    return Err(WorkflowError::PipelineOrder {
                        stage: stage.operation_name().to_string(),
                        phase,
                        after,
                    });
                }
            }
            previous = Some(phase);
        }

        info!(stages = ?registry.names(), "Workflow pipeline configured");

        Ok(Self { registry, config })
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Admit a new job: readiness check of the first stage, then
    /// `NotStarted -> UploadingSlice`.
    #[instrument(skip_all, fields(job_id = %ctx.job_id()))]
    pub fn begin(&self, ctx: &WorkflowContext) -> Result<(), WorkflowError> {
        let stage = self
            .registry
            .iter()
            .next()
            .ok_or(WorkflowError::MissingStage(StagePhase::Upload))?;
        self.enter(ctx, stage.as_ref())
    }

    /// Run a single stage by operation name
    pub async fn run_stage(
        &self,
        ctx: &WorkflowContext,
        name: &str,
    ) -> Result<FileStatus, WorkflowError> {
        let stage = self
            .registry
            .get(name)
            .ok_or_else(|| WorkflowError::UnknownStage(name.to_string()))?;
        self.drive(ctx, stage.as_ref()).await
    }

    /// Run every remaining stage, then mark the job finished
    #[instrument(skip_all, fields(job_id = %ctx.job_id()))]
    pub async fn run(&self, ctx: &WorkflowContext) -> Result<FileStatus, WorkflowError> {
        for stage in self.registry.iter() {
            let Some(pending) = StagePhase::pending_for(ctx.status()) else {
                break;
            };

            match stage.phase().cmp(&pending) {
                Ordering::Less => continue,
                Ordering::Equal => {
                    self.drive(ctx, stage.as_ref()).await?;
                }
                Ordering::Greater => return Err(WorkflowError::MissingStage(pending)),
            }
        }

        let status = ctx.status();
        if status == FileStatus::TransportSuccess {
            ctx.transition(FileStatus::Finished)?;
            info!("Job finished");
        } else if let Some(pending) = StagePhase::pending_for(status) {
            return Err(WorkflowError::MissingStage(pending));
        }

        Ok(ctx.status())
    }

    /// Cancel the job if its active stage reports a timeout.
    ///
    /// Returns `true` when the job was moved to its failure state and
    /// cleaned up.
    #[instrument(skip_all, fields(job_id = %ctx.job_id()))]
    pub async fn check_timeout(
        &self,
        ctx: &WorkflowContext,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let Some(phase) = StagePhase::active_for(ctx.status()) else {
            return Ok(false);
        };
        let Some(stage) = self.registry.for_phase(phase) else {
            return Ok(false);
        };

        if !(stage.should_check_timeout(ctx, now) && stage.is_timed_out(ctx, now)) {
            return Ok(false);
        }

        let name = stage.operation_name().to_string();
        warn!(stage = %name, "Stage timed out, cancelling job");
        ctx.transition(phase.failure())?;

        if let Err(source) = stage.cleanup(ctx, false).await {
            self.cleanup_failed(name, source)?;
        }

        Ok(true)
    }

    /// `(max, now)` progress of the active stage, `(1, 0)` when none is active
    pub fn progress(&self, ctx: &WorkflowContext) -> (u64, u64) {
        StagePhase::active_for(ctx.status())
            .and_then(|phase| self.registry.for_phase(phase))
            .map_or((1, 0), |stage| stage.progress(ctx))
    }

    fn enter(&self, ctx: &WorkflowContext, stage: &dyn WorkflowStage) -> Result<(), WorkflowError> {
        if !stage.is_context_suitable(ctx) {
            return Err(WorkflowError::NotReady {
                stage: stage.operation_name().to_string(),
            });
        }

        let running = stage.phase().running();
        if ctx.status() != running {
            ctx.transition(running)?;
            info!(job_id = %ctx.job_id(), stage = stage.operation_name(), status = %running, "Stage entered");
        }

        Ok(())
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id(), stage = stage.operation_name()))]
    async fn drive(
        &self,
        ctx: &WorkflowContext,
        stage: &dyn WorkflowStage,
    ) -> Result<FileStatus, WorkflowError> {
        let name = stage.operation_name().to_string();
        let phase = stage.phase();

        self.enter(ctx, stage)?;

        let outcome = stage.execute(ctx).await;
        let cleanup = stage.cleanup(ctx, outcome.is_ok()).await;

        match (outcome, cleanup) {
            (Err(source), cleanup) => {
                if let Err(cleanup_error) = cleanup {
                    error!(error = %cleanup_error, "Cleanup after failed stage also failed");
                }
                self.mark_failed(ctx, phase);
                error!(error = %source, status = %phase.failure(), "Stage failed");
                Err(WorkflowError::Execution {
                    stage: name,
                    source,
                })
            }
            (Ok(()), Err(source)) => {
                if self.config.cleanup_policy == CleanupPolicy::Fail {
                    self.mark_failed(ctx, phase);
                }
                self.cleanup_failed(name, source)?;
                ctx.transition(phase.success())?;
                Ok(phase.success())
            }
            (Ok(()), Ok(())) => {
                ctx.transition(phase.success())?;
                info!(status = %phase.success(), "Stage completed");
                Ok(phase.success())
            }
        }
    }

    /// Move to the phase's failure state. A refused move is logged so the
    /// stage error that caused it is the one reported.
    fn mark_failed(&self, ctx: &WorkflowContext, phase: StagePhase) {
        if let Err(e) = ctx.transition(phase.failure()) {
            error!(error = %e, status = %ctx.status(), "Could not record stage failure");
        }
    }

    fn cleanup_failed(&self, stage: String, source: StageError) -> Result<(), WorkflowError> {
        match self.config.cleanup_policy {
            CleanupPolicy::Fail => {
                error!(stage = %stage, error = %source, "Stage cleanup failed");
                Err(WorkflowError::Cleanup { stage, source })
            }
            CleanupPolicy::Tolerate => {
                warn!(stage = %stage, error = %source, "Stage cleanup failed, continuing");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
