//! Workflow orchestration core
//!
//! - [`context`]: the per-job store shared by all stages
//! - [`stage`]: the contract every pipeline stage implements
//! - [`status`]: the file status state machine
//! - [`orchestrator`]: drives a job through the configured stages

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod stage;
pub mod status;
pub mod temp_file;

pub use context::{ContextSnapshot, Progress, WorkflowContext};
pub use error::{StageError, WorkflowError};
pub use orchestrator::WorkflowOrchestrator;
pub use params::{keys, ParamType, ParamValue};
pub use registry::StageRegistry;
pub use stage::{default_cleanup, WorkflowStage};
pub use status::{FileStatus, StagePhase, TransitionError};
pub use temp_file::TempFile;
