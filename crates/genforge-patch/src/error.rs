//! Error types for patching

use std::path::PathBuf;

use genforge_files::FileError;
use thiserror::Error;

/// Errors that can occur while applying a patch
#[derive(Debug, Error)]
pub enum PatchError {
    /// A marker could not be found in the target file
    #[error("Marker {marker:?} not found in {file:?}")]
    MarkerNotFound { file: PathBuf, marker: String },

    /// The end marker only occurs before the start marker
    #[error("End marker {end:?} precedes start marker {start:?} in {file:?}")]
    MarkerOrder {
        file: PathBuf,
        start: String,
        end: String,
    },

    /// The file to patch does not exist
    #[error("File to patch not found: {0:?}")]
    FileNotFound(PathBuf),

    /// The operation has no content to write
    #[error("Patch {key:?} has no content")]
    ContentMissing { key: String },

    /// The operation is malformed
    #[error("Invalid patch operation: {0}")]
    InvalidOperation(String),

    /// File system error (path escapes, failed writes)
    #[error(transparent)]
    File(#[from] FileError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
