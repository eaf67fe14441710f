//! Error types for file management operations

use std::path::PathBuf;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// File or directory not found at the specified path
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// A relative path would resolve outside of its root
    #[error("Path {path:?} escapes root {root:?}")]
    PathEscape {
        /// The offending relative path
        path: PathBuf,
        /// The root it was resolved against
        root: PathBuf,
    },

    /// Commit target already exists and overwriting was not allowed
    #[error("Target already exists: {0}")]
    TargetExists(PathBuf),

    /// Staging directory is missing or could not be allocated
    #[error("Staging failed: {0}")]
    StagingFailed(String),

    /// Moving the existing target aside before commit failed
    #[error("Failed to back up existing target {target:?}: {source}")]
    CommitBackupFailed {
        /// Target directory that was being replaced
        target: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Relocating staging into the target failed
    #[error("Commit to {target:?} failed: {reason} (backup restored: {restored})")]
    CommitFailed {
        /// Target directory of the commit
        target: PathBuf,
        /// Description of the relocation failure
        reason: String,
        /// Whether a pre-commit backup was put back in place
        restored: bool,
    },

    /// Transaction bookkeeping error
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Atomic write of a single file failed
    #[error("Write to {path:?} failed: {source}")]
    WriteFailed {
        /// Destination of the write
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
