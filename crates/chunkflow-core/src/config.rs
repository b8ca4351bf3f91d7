//! Workflow configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Progress weighting
// ============================================================================

/// Progress weight of a cheap sub-task (renaming, bookkeeping, one slice append)
pub const PROGRESS_UNIT_LIGHT: u64 = 1;

/// Progress weight of an expensive sub-task (network transfer, transcoding)
pub const PROGRESS_UNIT_HEAVY: u64 = 10;

// ============================================================================
// Defaults
// ============================================================================

/// Default root for per-job scratch directories.
pub const DEFAULT_WORK_DIR: &str = "./chunkflow-work";

/// Default idle time before an upload waiting on client slices is cancelled.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 600;

/// Most slices a single upload may announce.
pub const MAX_SLICE_COUNT: u64 = 100_000;

/// Default object-storage bucket for transported files.
pub const DEFAULT_BUCKET: &str = "chunkflow";

/// What the orchestrator does when a stage's cleanup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    /// The job moves to the stage's failure state
    #[default]
    Fail,
    /// The failure is logged and the job continues
    Tolerate,
}

impl std::str::FromStr for CleanupPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" | "fail-job" => Ok(CleanupPolicy::Fail),
            "tolerate" | "ignore" => Ok(CleanupPolicy::Tolerate),
            _ => Err(anyhow::anyhow!("Invalid cleanup policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub work_dir: PathBuf,
    pub upload_timeout_secs: u64,
    pub cleanup_policy: CleanupPolicy,
    pub bucket: String,
}

impl WorkflowConfig {
    /// Load from `.env` and `CHUNKFLOW_*` variables on top of the defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            work_dir: std::env::var("CHUNKFLOW_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            upload_timeout_secs: std::env::var("CHUNKFLOW_UPLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.upload_timeout_secs),
            cleanup_policy: match std::env::var("CHUNKFLOW_CLEANUP_POLICY") {
                Ok(policy) => policy.parse()?,
                Err(_) => defaults.cleanup_policy,
            },
            bucket: std::env::var("CHUNKFLOW_BUCKET").unwrap_or(defaults.bucket),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upload_timeout_secs == 0 {
            anyhow::bail!("Upload timeout must be greater than 0");
        }

        if self.bucket.trim().is_empty() {
            anyhow::bail!("Bucket name cannot be empty");
        }

        if self.work_dir.as_os_str().is_empty() {
            anyhow::bail!("Work directory cannot be empty");
        }

        Ok(())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            cleanup_policy: CleanupPolicy::Fail,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = WorkflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cleanup_policy, CleanupPolicy::Fail);
        assert_eq!(config.upload_timeout(), Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS));
    }

    #[test]
    fn rejects_empty_bucket_and_zero_timeout() {
        let mut config = WorkflowConfig::default();
        config.bucket = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = WorkflowConfig::default();
        config.upload_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_cleanup_policy() {
        assert_eq!("tolerate".parse::<CleanupPolicy>().unwrap(), CleanupPolicy::Tolerate);
        assert_eq!("FAIL".parse::<CleanupPolicy>().unwrap(), CleanupPolicy::Fail);
        assert!("retry".parse::<CleanupPolicy>().is_err());
    }

    #[test]
    fn heavy_outweighs_light() {
        assert_eq!(PROGRESS_UNIT_LIGHT, 1);
        assert_eq!(PROGRESS_UNIT_HEAVY, 10);
    }
}
