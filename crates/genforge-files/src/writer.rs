//! Atomic single-file writes
//!
//! Content is written to a temporary sibling of the destination and renamed
//! over it, so readers observe either the old file or the new one.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::FileError;
use crate::models::WriteRecord;

/// Implements the write-temp-then-rename pattern
#[derive(Debug, Clone, Default)]
pub struct SafeWriter;

impl SafeWriter {
    /// Creates a new SafeWriter instance
    pub fn new() -> Self {
        SafeWriter
    }

    /// Atomically replace `path` with `content`.
    ///
    /// Parent directories are created as needed. If the destination already
    /// exists its permissions carry over to the new file.
    pub async fn write(&self, path: &Path, content: &[u8]) -> Result<WriteRecord, FileError> {
        self.write_with_mode(path, content, None).await
    }

    /// Atomically replace `path` with `content` and apply `mode`.
    ///
    /// `mode` holds Unix permission bits and is ignored on other platforms.
    pub async fn write_with_mode(
        &self,
        path: &Path,
        content: &[u8],
        mode: Option<u32>,
    ) -> Result<WriteRecord, FileError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| FileError::WriteFailed {
                        path: path.to_path_buf(),
                        source,
                    })?;
            }
        }

        let existing = fs::metadata(path).await.ok();
        let temp_path = Self::temp_path(path);

        let result = Self::write_temp_and_rename(
            &temp_path,
            path,
            content,
            mode,
            existing.as_ref().map(|m| m.permissions()),
        )
        .await;

        if let Err(source) = result {
            if let Err(cleanup_err) = fs::remove_file(&temp_path).await {
                if cleanup_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Failed to remove temp file {}: {}",
                        temp_path.display(),
                        cleanup_err
                    );
                }
            }
            return Err(FileError::WriteFailed {
                path: path.to_path_buf(),
                source,
            });
        }

        debug!("Wrote {} bytes to {}", content.len(), path.display());

        Ok(WriteRecord {
            path: path.to_path_buf(),
            created: existing.is_none(),
            bytes_written: content.len(),
        })
    }

    async fn write_temp_and_rename(
        temp_path: &Path,
        path: &Path,
        content: &[u8],
        mode: Option<u32>,
        existing_permissions: Option<std::fs::Permissions>,
    ) -> std::io::Result<()> {
        fs::write(temp_path, content).await?;

        match (mode, existing_permissions) {
            (Some(mode), _) => apply_mode(temp_path, mode).await?,
            (None, Some(permissions)) => fs::set_permissions(temp_path, permissions).await?,
            (None, None) => {}
        }

        fs::rename(temp_path, path).await
    }

    /// Temporary sibling path for `path`
    fn temp_path(path: &Path) -> PathBuf {
        let mut temp_path = path.to_path_buf();
        let file_name = format!(
            ".{}.tmp-{}",
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("file"),
            Uuid::new_v4().simple()
        );
        temp_path.set_file_name(file_name);
        temp_path
    }
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn apply_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_new_file() {
        let writer = SafeWriter::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("new.txt");

        let record = writer.write(&path, b"test content").await.unwrap();

        assert_eq!(record.path, path);
        assert!(record.created);
        assert_eq!(record.bytes_written, 12);
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file() {
        let writer = SafeWriter::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("existing.txt");
        fs::write(&path, "old content").await.unwrap();

        let record = writer.write(&path, b"new content").await.unwrap();

        assert!(!record.created);
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "new content");
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let writer = SafeWriter::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("subdir/nested/file.txt");

        writer.write(&path, b"test content").await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let writer = SafeWriter::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("clean.txt");

        writer.write(&path, b"one").await.unwrap();
        writer.write(&path, b"two").await.unwrap();

        let mut entries = fs::read_dir(temp_dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["clean.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_write_into_directory_path_fails_and_cleans_up() {
        let writer = SafeWriter::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("occupied");
        fs::create_dir(&path).await.unwrap();
        fs::write(path.join("inner.txt"), "x").await.unwrap();

        let result = writer.write(&path, b"content").await;

        assert!(matches!(result, Err(FileError::WriteFailed { .. })));
        let mut entries = fs::read_dir(temp_dir.path()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1, "temp file should have been removed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_with_mode_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let writer = SafeWriter::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("script.sh");

        writer
            .write_with_mode(&path, b"#!/bin/sh\n", Some(0o755))
            .await
            .unwrap();

        let mode = fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let writer = SafeWriter::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("run.sh");
        fs::write(&path, "old").await.unwrap();
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
            .await
            .unwrap();

        writer.write(&path, b"new").await.unwrap();

        let mode = fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
