//! File status state machine
//!
//! A job walks the pipeline in a fixed order:
//!
//! ```text
//! NotStarted -> UploadingSlice -> UploadSuccess -> MergingSlice -> MergeSuccess
//!   -> Transforming -> TransformSuccess -> TransportMinio -> TransportSuccess -> Finished
//! ```
//!
//! Each stage has one failure state (`UploadCancel`, `MergeError`,
//! `TransformError`, `TransportCancel`) reachable from any non-terminal state
//! that belongs to it. Terminal states accept no further transition.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FileStatus {
    #[default]
    NotStarted,
    UploadingSlice,
    UploadCancel,
    UploadSuccess,
    MergingSlice,
    MergeError,
    MergeSuccess,
    Transforming,
    TransformError,
    TransformSuccess,
    TransportMinio,
    TransportCancel,
    TransportSuccess,
    Finished,
}

/// Rejected state-machine move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: FileStatus,
    pub to: FileStatus,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::NotStarted => "not_started",
            FileStatus::UploadingSlice => "uploading_slice",
            FileStatus::UploadCancel => "upload_cancel",
            FileStatus::UploadSuccess => "upload_success",
            FileStatus::MergingSlice => "merging_slice",
            FileStatus::MergeError => "merge_error",
            FileStatus::MergeSuccess => "merge_success",
            FileStatus::Transforming => "transforming",
            FileStatus::TransformError => "transform_error",
            FileStatus::TransformSuccess => "transform_success",
            FileStatus::TransportMinio => "transport_minio",
            FileStatus::TransportCancel => "transport_cancel",
            FileStatus::TransportSuccess => "transport_success",
            FileStatus::Finished => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_failure() || *self == FileStatus::Finished
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileStatus::UploadCancel
                | FileStatus::MergeError
                | FileStatus::TransformError
                | FileStatus::TransportCancel
        )
    }

    /// Failure state a job in this status falls into on an unrecoverable error.
    ///
    /// A `*Success` status belongs to the stage that runs next, so it fails
    /// into that stage's failure state. Terminal states have none.
    pub fn failure_state(&self) -> Option<FileStatus> {
        match self {
            FileStatus::NotStarted | FileStatus::UploadingSlice => Some(FileStatus::UploadCancel),
            FileStatus::UploadSuccess | FileStatus::MergingSlice => Some(FileStatus::MergeError),
            FileStatus::MergeSuccess | FileStatus::Transforming => Some(FileStatus::TransformError),
            FileStatus::TransformSuccess
            | FileStatus::TransportMinio
            | FileStatus::TransportSuccess => Some(FileStatus::TransportCancel),
            _ => None,
        }
    }

    /// Every status reachable in one step
    pub fn successors(&self) -> Vec<FileStatus> {
        let forward = match self {
            FileStatus::NotStarted => Some(FileStatus::UploadingSlice),
            FileStatus::UploadingSlice => Some(FileStatus::UploadSuccess),
            FileStatus::UploadSuccess => Some(FileStatus::MergingSlice),
            FileStatus::MergingSlice => Some(FileStatus::MergeSuccess),
            FileStatus::MergeSuccess => Some(FileStatus::Transforming),
            FileStatus::Transforming => Some(FileStatus::TransformSuccess),
            FileStatus::TransformSuccess => Some(FileStatus::TransportMinio),
            FileStatus::TransportMinio => Some(FileStatus::TransportSuccess),
            FileStatus::TransportSuccess => Some(FileStatus::Finished),
            _ => None,
        };

        forward.into_iter().chain(self.failure_state()).collect()
    }

    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Validated move to `next`
    pub fn transition(self, next: FileStatus) -> Result<FileStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline position of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StagePhase {
    Upload,
    Merge,
    Transform,
    Transport,
}

impl StagePhase {
    pub const ALL: [StagePhase; 4] = [
        StagePhase::Upload,
        StagePhase::Merge,
        StagePhase::Transform,
        StagePhase::Transport,
    ];

    /// Status a job must hold before this phase may start
    pub fn entry(&self) -> FileStatus {
        match self {
            StagePhase::Upload => FileStatus::NotStarted,
            StagePhase::Merge => FileStatus::UploadSuccess,
            StagePhase::Transform => FileStatus::MergeSuccess,
            StagePhase::Transport => FileStatus::TransformSuccess,
        }
    }

    pub fn running(&self) -> FileStatus {
        match self {
            StagePhase::Upload => FileStatus::UploadingSlice,
            StagePhase::Merge => FileStatus::MergingSlice,
            StagePhase::Transform => FileStatus::Transforming,
            StagePhase::Transport => FileStatus::TransportMinio,
        }
    }

    pub fn success(&self) -> FileStatus {
        match self {
            StagePhase::Upload => FileStatus::UploadSuccess,
            StagePhase::Merge => FileStatus::MergeSuccess,
            StagePhase::Transform => FileStatus::TransformSuccess,
            StagePhase::Transport => FileStatus::TransportSuccess,
        }
    }

    pub fn failure(&self) -> FileStatus {
        match self {
            StagePhase::Upload => FileStatus::UploadCancel,
            StagePhase::Merge => FileStatus::MergeError,
            StagePhase::Transform => FileStatus::TransformError,
            StagePhase::Transport => FileStatus::TransportCancel,
        }
    }

    /// Phase that owns a job currently in `status`, if any stage is active
    pub fn active_for(status: FileStatus) -> Option<StagePhase> {
        StagePhase::ALL.into_iter().find(|phase| phase.running() == status)
    }

    /// Phase that still has to finish before a job in `status` can move on
    pub fn pending_for(status: FileStatus) -> Option<StagePhase> {
        StagePhase::ALL
            .into_iter()
            .find(|phase| phase.entry() == status || phase.running() == status)
    }
}
