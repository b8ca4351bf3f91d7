//! Chunkflow Core
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Orchestration core for chunked file ingestion. A client uploads a file in
//! slices; the job then moves through merge, transform and transport stages
//! until the result sits in object storage.
//!
//! - [`workflow`]: context, stage contract, status machine, orchestrator
//! - [`stages`]: reference upload, merge, transform and transport stages
//! - [`fingerprint`]: pluggable fingerprint mappers
//! - [`storage`]: object storage backends
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chunkflow_core::config::WorkflowConfig;
//! use chunkflow_core::stages::{SliceMergeStage, SliceUploadStage, TransformStage, TransportStage};
//! use chunkflow_core::storage::MemoryStorage;
//! use chunkflow_core::workflow::{WorkflowOrchestrator, WorkflowStage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkflowConfig::load()?;
//! let stages: Vec<Arc<dyn WorkflowStage>> = vec![
//!     Arc::new(SliceUploadStage::new(config.upload_timeout())),
//!     Arc::new(SliceMergeStage::new()),
//!     Arc::new(TransformStage::passthrough()),
//!     Arc::new(TransportStage::new(Arc::new(MemoryStorage::new()))),
//! ];
//! let orchestrator = WorkflowOrchestrator::new(stages, config)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fingerprint;
pub mod stages;
pub mod storage;
pub mod workflow;

pub use config::{CleanupPolicy, WorkflowConfig};
pub use fingerprint::{Fingerprint, FingerprintMapper, Mapper};
pub use workflow::{FileStatus, WorkflowContext, WorkflowOrchestrator, WorkflowStage};
