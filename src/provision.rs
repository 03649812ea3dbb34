//! Directory provisioning.
//!
//! Every batch writes into exactly one directory, and that directory is
//! created here before any compression task starts.

use std::path::Path;

use tracing::{debug, warn};

use crate::PipelineError;

/// Create `directory` and all of its parents.
///
/// Succeeds without doing anything when the directory already exists, and is
/// safe to race against other callers creating the same tree.
pub async fn ensure_directory(directory: &Path) -> Result<(), PipelineError> {
    match tokio::fs::create_dir_all(directory).await {
        Ok(()) => {
            debug!(directory = %directory.display(), "directory_ready");
            Ok(())
        }
        Err(err) => {
            warn!(directory = %directory.display(), error = %err, "directory_creation_failure");
            Err(PipelineError::DirectoryCreation {
                path: directory.to_path_buf(),
                reason: err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_directories() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a@b.com").join("product").join("1234");
        ensure_directory(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn existing_directory_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("profile");
        ensure_directory(&dir).await.unwrap();
        std::fs::write(dir.join("keep.jpeg"), b"x").unwrap();
        ensure_directory(&dir).await.unwrap();
        assert!(dir.join("keep.jpeg").exists());
    }

    #[tokio::test]
    async fn file_in_the_way_fails() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("a@b.com");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let err = ensure_directory(&blocker.join("profile")).await.unwrap_err();
        match err {
            PipelineError::DirectoryCreation { path, reason } => {
                assert_eq!(path, blocker.join("profile"));
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
