//! Workflow stage contract
//!
//! Every pipeline step implements [`WorkflowStage`]. The orchestrator drives
//! a stage through a fixed protocol:
//!
//! 1. [`is_context_suitable`](WorkflowStage::is_context_suitable) decides
//!    whether the stage may run. It only reads the context.
//! 2. [`execute`](WorkflowStage::execute) does the work. It never recovers
//!    on its own.
//! 3. [`cleanup`](WorkflowStage::cleanup) runs exactly once after every
//!    `execute` attempt, told whether that attempt succeeded.
//!
//! Progress and timeout accessors may be called at any time from another
//! task and never fail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use tracing::{debug, warn};

use super::context::WorkflowContext;
use super::error::StageError;
use super::params::ParamType;
use super::status::StagePhase;

#[async_trait]
pub trait WorkflowStage: Send + Sync {
    /// Globally unique operation name
    fn operation_name(&self) -> &str;

    /// Pipeline position of this stage
    fn phase(&self) -> StagePhase;

    /// Context keys and value types needed before the stage may run
    fn required_parameters(&self) -> &[(&'static str, ParamType)] {
        &[]
    }

    /// True when every required parameter is present with the declared type.
    /// Logs the first mismatch.
    fn is_context_suitable(&self, ctx: &WorkflowContext) -> bool {
        for &(key, expected) in self.required_parameters() {
            let found = ctx.param_type(key);
            if found != Some(expected) {
                debug!(
                    job_id = %ctx.job_id(),
                    stage = self.operation_name(),
                    key,
                    %expected,
                    ?found,
                    "Context not suitable for stage"
                );
                return false;
            }
        }
        true
    }

    async fn execute(&self, ctx: &WorkflowContext) -> Result<(), StageError>;

    /// Release this attempt's temporary resources.
    ///
    /// Overrides must still drain the cleanup list, usually by calling
    /// [`default_cleanup`] first.
    async fn cleanup(&self, ctx: &WorkflowContext, _was_success: bool) -> Result<(), StageError> {
        default_cleanup(ctx)
    }

    fn max_progress(&self, ctx: &WorkflowContext) -> u64 {
        ctx.progress().map_or(1, |progress| progress.total)
    }

    fn current_progress(&self, ctx: &WorkflowContext) -> u64 {
        ctx.progress().map_or(0, |progress| progress.now)
    }

    /// `(max, now)` read in one critical section
    fn progress(&self, ctx: &WorkflowContext) -> (u64, u64) {
        ctx.progress()
            .map_or((1, 0), |progress| (progress.total, progress.now))
    }

    fn should_check_timeout(&self, _ctx: &WorkflowContext, _now: DateTime<Utc>) -> bool {
        false
    }

    fn is_timed_out(&self, _ctx: &WorkflowContext, _now: DateTime<Utc>) -> bool {
        false
    }
}

/// Clear progress and delete every entry of the cleanup list.
///
/// An entry is removed once its file is gone; a file that is already absent
/// counts as deleted. Any other deletion error stops the drain and leaves the
/// failing entry and everything after it in the list. Files are deleted
/// without holding the context lock, so progress polling is never blocked
/// behind filesystem work.
pub fn default_cleanup(ctx: &WorkflowContext) -> Result<(), StageError> {
    let job_id = ctx.job_id();
    let pending = ctx.with_state(|state| {
        state.progress = None;
        state.cleanup_files.clone()
    });

    let mut outcome = Ok(());
    let mut done = Vec::with_capacity(pending.len());
    for file in pending {
        if file.is_null() {
            warn!(%job_id, "Dropping cleanup entry without a path");
        } else {
            match file.delete() {
                Ok(()) => debug!(%job_id, path = %file.path().display(), "Deleted temp file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(%job_id, path = %file.path().display(), "Temp file already absent")
                }
                Err(source) => {
                    outcome = Err(StageError::Cleanup {
                        path: file.path().to_path_buf(),
                        source,
                    });
                    break;
                }
            }
        }
        done.push(file);
    }

    // Entries appended while the lock was released stay queued.
    ctx.with_state(|state| {
        for file in &done {
            if let Some(pos) = state.cleanup_files.iter().position(|f| f == file) {
                state.cleanup_files.remove(pos);
            }
        }
    });

    outcome
}
