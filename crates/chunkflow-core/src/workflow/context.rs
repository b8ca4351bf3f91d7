//! Per-job workflow context
//!
//! One [`WorkflowContext`] follows a job through every stage. All state sits
//! behind a single mutex so that a status poller reading progress while a
//! stage is executing sees `total` and `now` change together.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::error::StageError;
use super::params::{keys, ParamType, ParamValue};
use super::status::{FileStatus, TransitionError};
use super::temp_file::TempFile;
use crate::fingerprint::Fingerprint;

/// Progress of the active stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: u64,
    pub now: u64,
}

#[derive(Debug, Default)]
pub(crate) struct ContextState {
    pub(crate) params: BTreeMap<String, ParamValue>,
    pub(crate) progress: Option<Progress>,
    pub(crate) cleanup_files: Vec<TempFile>,
    pub(crate) status: FileStatus,
}

/// Point-in-time copy of a context, comparable for equality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub params: BTreeMap<String, ParamValue>,
    pub progress: Option<Progress>,
    pub cleanup_files: Vec<TempFile>,
    pub status: FileStatus,
}

#[derive(Debug)]
pub struct WorkflowContext {
    job_id: Uuid,
    state: Mutex<ContextState>,
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::with_job_id(Uuid::new_v4())
    }

    pub fn with_job_id(job_id: Uuid) -> Self {
        Self {
            job_id,
            state: Mutex::new(ContextState::default()),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    // A panicking stage must not wedge status polling, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut ContextState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let state = self.lock();
        ContextSnapshot {
            params: state.params.clone(),
            progress: state.progress,
            cleanup_files: state.cleanup_files.clone(),
            status: state.status,
        }
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    pub fn set(&self, key: &str, value: impl Into<ParamValue>) {
        self.lock().params.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.lock().params.get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<ParamValue> {
        self.lock().params.remove(key)
    }

    /// Declared type of the value under `key`, if any
    pub fn param_type(&self, key: &str) -> Option<ParamType> {
        self.lock().params.get(key).map(ParamValue::param_type)
    }

    pub fn require_text(&self, key: &str) -> Result<String, StageError> {
        self.get(key)
            .and_then(|value| value.as_text().map(str::to_string))
            .ok_or_else(|| StageError::parameter(key, ParamType::Text))
    }

    pub fn require_integer(&self, key: &str) -> Result<i64, StageError> {
        self.get(key)
            .and_then(|value| value.as_integer())
            .ok_or_else(|| StageError::parameter(key, ParamType::Integer))
    }

    pub fn require_fingerprint(&self, key: &str) -> Result<Fingerprint, StageError> {
        self.get(key)
            .and_then(|value| value.as_fingerprint().cloned())
            .ok_or_else(|| StageError::parameter(key, ParamType::Fingerprint))
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).and_then(|value| value.as_timestamp())
    }

    /// Add `index` to the index set under `key`, creating it if absent.
    /// Returns the set's size; a value of another type is replaced.
    pub fn insert_index(&self, key: &str, index: u64) -> u64 {
        let mut state = self.lock();
        let entry = state
            .params
            .entry(key.to_string())
            .or_insert_with(|| ParamValue::Indices(BTreeSet::new()));
        if !matches!(entry, ParamValue::Indices(_)) {
            *entry = ParamValue::Indices(BTreeSet::new());
        }
        match entry {
            ParamValue::Indices(set) => {
                set.insert(index);
                set.len() as u64
            }
            _ => 0,
        }
    }

    pub fn indices(&self, key: &str) -> BTreeSet<u64> {
        self.get(key)
            .and_then(|value| value.as_indices().cloned())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Stage output files
    // ------------------------------------------------------------------

    /// Replace the current output files; an empty list clears them
    pub fn set_files(&self, files: Vec<TempFile>) {
        let mut state = self.lock();
        if files.is_empty() {
            state.params.remove(keys::FILES);
        } else {
            state.params.insert(keys::FILES.to_string(), ParamValue::Files(files));
        }
    }

    pub fn files(&self) -> Vec<TempFile> {
        match self.lock().params.get(keys::FILES) {
            Some(ParamValue::Files(files)) => files.clone(),
            _ => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Cleanup list
    // ------------------------------------------------------------------

    /// Append to the cleanup list, keeping existing entries
    pub fn add_cleanup_files(&self, files: impl IntoIterator<Item = TempFile>) {
        self.lock().cleanup_files.extend(files);
    }

    pub fn cleanup_files(&self) -> Vec<TempFile> {
        self.lock().cleanup_files.clone()
    }

    // ------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------

    pub fn progress(&self) -> Option<Progress> {
        self.lock().progress
    }

    pub fn set_progress(&self, total: u64, now: u64) {
        self.lock().progress = Some(Progress { total, now });
    }

    /// Move `now` forward by `units`, capped at `total`.
    /// Does nothing until a total has been set.
    pub fn advance_progress(&self, units: u64) {
        if let Some(progress) = self.lock().progress.as_mut() {
            progress.now = progress.now.saturating_add(units).min(progress.total);
        }
    }

    pub fn clear_progress(&self) {
        self.lock().progress = None;
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn status(&self) -> FileStatus {
        self.lock().status
    }

    /// Validated status move; returns the previous status
    pub fn transition(&self, next: FileStatus) -> Result<FileStatus, TransitionError> {
        let mut state = self.lock();
        let previous = state.status;
        state.status = previous.transition(next)?;
        Ok(previous)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let ctx = WorkflowContext::new();
        ctx.set(keys::UPLOAD_ID, "abc");
        ctx.set(keys::SLICE_COUNT, 3_i64);

        assert_eq!(ctx.require_text(keys::UPLOAD_ID).unwrap(), "abc");
        assert_eq!(ctx.require_integer(keys::SLICE_COUNT).unwrap(), 3);
        assert_eq!(ctx.param_type(keys::UPLOAD_ID), Some(ParamType::Text));

        let err = ctx.require_integer(keys::UPLOAD_ID).unwrap_err();
        assert!(matches!(err, StageError::Parameter { ref key, .. } if key == keys::UPLOAD_ID));
    }

    #[test]
    fn index_sets_count_distinct_entries() {
        let ctx = WorkflowContext::new();
        assert!(ctx.indices("seen").is_empty());

        assert_eq!(ctx.insert_index("seen", 4), 1);
        assert_eq!(ctx.insert_index("seen", 0), 2);
        assert_eq!(ctx.insert_index("seen", 4), 2);
        assert_eq!(ctx.indices("seen").into_iter().collect::<Vec<_>>(), vec![0, 4]);
        assert_eq!(ctx.param_type("seen"), Some(ParamType::Indices));
    }

    #[test]
    fn set_files_with_empty_list_clears() {
        let ctx = WorkflowContext::new();
        ctx.set_files(vec![TempFile::new("/tmp/a")]);
        assert_eq!(ctx.files().len(), 1);

        ctx.set_files(Vec::new());
        assert!(ctx.files().is_empty());
        assert!(ctx.get(keys::FILES).is_none());
    }

    #[test]
    fn cleanup_list_appends() {
        let ctx = WorkflowContext::new();
        ctx.add_cleanup_files([TempFile::new("/tmp/a")]);
        ctx.add_cleanup_files([TempFile::new("/tmp/b"), TempFile::new("/tmp/c")]);
        ctx.add_cleanup_files(Vec::new());

        let paths: Vec<_> = ctx.cleanup_files().into_iter().map(|f| f.path().to_owned()).collect();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("a"));
        assert!(paths[2].ends_with("c"));
    }

    #[test]
    fn progress_is_capped_and_cleared_together() {
        let ctx = WorkflowContext::new();
        ctx.advance_progress(5);
        assert_eq!(ctx.progress(), None);

        ctx.set_progress(10, 0);
        ctx.advance_progress(4);
        ctx.advance_progress(40);
        assert_eq!(ctx.progress(), Some(Progress { total: 10, now: 10 }));

        ctx.clear_progress();
        assert_eq!(ctx.progress(), None);
    }

    #[test]
    fn transition_is_validated() {
        let ctx = WorkflowContext::new();
        assert_eq!(ctx.transition(FileStatus::UploadingSlice).unwrap(), FileStatus::NotStarted);
        assert!(ctx.transition(FileStatus::Finished).is_err());
        assert_eq!(ctx.status(), FileStatus::UploadingSlice);
    }
}
