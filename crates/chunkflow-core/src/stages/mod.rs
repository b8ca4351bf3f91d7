//! Reference pipeline stages
//!
//! Upload, merge, transform and transport, in pipeline order. Each stage is
//! stateless; everything job-specific lives in the context.

mod merge;
mod transform;
mod transport;
mod upload;

pub use merge::SliceMergeStage;
pub use transform::{PassthroughTranscoder, Transcoder, TransformStage};
pub use transport::TransportStage;
pub use upload::{SliceUploadStage, UploadRequest};

use std::path::{Path, PathBuf};

use crate::workflow::{keys, StageError, WorkflowContext};

fn slice_dir(ctx: &WorkflowContext) -> Result<PathBuf, StageError> {
    ctx.require_text(keys::SLICE_DIR).map(PathBuf::from)
}

/// Reduce a client-supplied name to its final path component.
///
/// Names that leave nothing usable (empty, `.`, `..`, a bare root) are
/// rejected so every derived path stays inside the job's slice directory.
pub(crate) fn checked_file_name(name: &str) -> Result<String, StageError> {
    match Path::new(name).file_name().and_then(|base| base.to_str()) {
        Some(base) if !base.is_empty() && base != "." && base != ".." => Ok(base.to_string()),
        _ => Err(StageError::invalid_parameter(
            keys::FILE_NAME,
            format!("{name:?} is not a usable file name"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn file_names_keep_only_the_last_component() {
        assert_eq!(checked_file_name("payload.bin").unwrap(), "payload.bin");
        assert_eq!(checked_file_name("/etc/passwd").unwrap(), "passwd");
        assert_eq!(checked_file_name("../../escape.bin").unwrap(), "escape.bin");
        assert_eq!(checked_file_name("nested/dir/name.txt").unwrap(), "name.txt");
    }

    #[test]
    fn unusable_file_names_are_rejected() {
        for name in ["", ".", "..", "/", "a/.."] {
            let err = checked_file_name(name).unwrap_err();
            assert!(
                matches!(err, StageError::InvalidParameter { ref key, .. } if key == keys::FILE_NAME),
                "{name:?} should be rejected"
            );
        }
    }
}
