//! Chunkflow Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging and checksum utilities used by every
//! chunkflow workspace member.
//!
//! # Example
//!
//! ```no_run
//! use chunkflow_common::checksum::compute_file_checksum;
//! use chunkflow_common::types::ChecksumAlgorithm;
//! use chunkflow_common::Result;
//!
//! fn fingerprint_upload(path: &str) -> Result<String> {
//!     compute_file_checksum(path, ChecksumAlgorithm::Sha256)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
