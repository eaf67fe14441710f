//! Error types for generation runs

use std::path::PathBuf;

use genforge_config::ConfigError;
use genforge_files::FileError;
use genforge_patch::PatchError;
use thiserror::Error;

/// Errors that can occur while planning, rendering or committing output
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A rewritten destination escapes the target root
    #[error("Template {source_path:?} maps to {destination:?}, outside of {target_root:?}")]
    PathTraversal {
        /// Template-relative source path
        source_path: PathBuf,
        /// Destination after rename rules were applied
        destination: String,
        /// Root the destination must stay within
        target_root: PathBuf,
    },

    /// Template root is missing or not a directory
    #[error("Template directory not found: {0:?}")]
    TemplateDirNotFound(PathBuf),

    /// Template syntax or rendering error
    #[error("Failed to render template {path:?}: {message}")]
    TemplateRenderError {
        /// Template-relative path of the failing file
        path: PathBuf,
        /// Message from the template engine
        message: String,
    },

    /// An output file already exists and overwriting was not allowed
    #[error("Output file already exists: {0:?}")]
    FileExists(PathBuf),

    /// Something other than a readable file occupies an output path
    #[error("Output path {path:?} is unusable: {source}")]
    DestinationUnavailable {
        /// Destination-relative path
        path: PathBuf,
        /// Underlying error (e.g. a parent is a regular file)
        source: std::io::Error,
    },

    /// Pre-flight check found outputs that already exist
    #[error("{} output file(s) already exist: {paths:?}", .paths.len())]
    OutputConflict {
        /// Destination-relative paths that already exist
        paths: Vec<PathBuf>,
    },

    /// An exclude glob could not be compiled
    #[error("Invalid exclude pattern {pattern:?}: {message}")]
    InvalidExcludePattern {
        /// The offending glob
        pattern: String,
        /// Parser message
        message: String,
    },

    /// File system error (staging, commit, atomic writes)
    #[error(transparent)]
    File(#[from] FileError),

    /// Patch error
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
