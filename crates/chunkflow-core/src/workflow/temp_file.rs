use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Handle to a job-owned temporary file or directory
///
/// An entry with an empty path stands for a missing reference; cleanup drops
/// it without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    pub fn is_null(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    pub fn exists(&self) -> bool {
        !self.is_null() && self.path.exists()
    }

    /// Remove the file, or the whole tree for a directory.
    ///
    /// Fails with `ErrorKind::NotFound` when nothing is there.
    pub fn delete(&self) -> io::Result<()> {
        let metadata = std::fs::symlink_metadata(&self.path)?;
        if metadata.is_dir() {
            std::fs::remove_dir_all(&self.path)
        } else {
            std::fs::remove_file(&self.path)
        }
    }
}

impl From<PathBuf> for TempFile {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for TempFile {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn delete_file_then_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk.part");
        std::fs::write(&path, b"data").unwrap();

        let file = TempFile::new(&path);
        assert!(file.exists());
        file.delete().unwrap();
        assert!(!file.exists());

        let err = file.delete().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn delete_removes_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("job").join("slices");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("000000.slice"), b"a").unwrap();

        let file = TempFile::new(dir.path().join("job"));
        file.delete().unwrap();
        assert!(!dir.path().join("job").exists());
    }

    #[test]
    fn empty_path_is_null() {
        assert!(TempFile::new("").is_null());
        assert!(!TempFile::new("").exists());
        assert_eq!(TempFile::new("/tmp/a.bin").file_name(), Some("a.bin"));
    }
}
