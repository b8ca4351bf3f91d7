//! Workflow error types

use std::path::PathBuf;
use thiserror::Error;

use super::params::ParamType;
use super::status::{StagePhase, TransitionError};
use crate::storage::StorageError;

/// Umbrella error for a stage's `execute` and `cleanup`
#[derive(Debug, Error)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Parameter error: {key} is missing or not {expected}")]
    Parameter { key: String, expected: ParamType },

    #[error("Parameter error: {key} {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Cleanup error: failed to delete {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Incomplete input: {0}")]
    Incomplete(String),

    #[error("Integrity error: {0}")]
    Integrity(#[from] chunkflow_common::CommonError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub fn parameter(key: &str, expected: ParamType) -> Self {
        StageError::Parameter {
            key: key.to_string(),
            expected,
        }
    }

    pub fn invalid_parameter(key: &str, reason: impl Into<String>) -> Self {
        StageError::InvalidParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Orchestrator-level failures
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Stage {stage} is not ready: required parameters are missing or mistyped")]
    NotReady { stage: String },

    #[error("Stage {stage} failed: {source}")]
    Execution {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Cleanup of stage {stage} failed: {source}")]
    Cleanup {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Status error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Duplicate stage operation name: {0}")]
    DuplicateStage(String),

    #[error("Stage operation name cannot be empty")]
    EmptyStageName,

    #[error("Stage {stage} ({phase:?}) must not follow a {after:?} stage")]
    PipelineOrder {
        stage: String,
        phase: StagePhase,
        after: StagePhase,
    },

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("No stage configured for the {0:?} phase")]
    MissingStage(StagePhase),
}
