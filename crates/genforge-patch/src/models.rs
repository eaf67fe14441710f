//! Patch operations and their results

use std::path::{Path, PathBuf};

use genforge_files::LineEndingPolicy;
use serde::{Deserialize, Serialize};

/// A fully resolved edit to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchOperation {
    /// Insert content right after the start marker
    MarkerInsert {
        file: PathBuf,
        idempotency_key: String,
        marker_start: String,
        marker_end: String,
        content: String,
    },
    /// Replace everything between the two markers
    MarkerReplace {
        file: PathBuf,
        idempotency_key: String,
        marker_start: String,
        marker_end: String,
        content: String,
    },
    /// Append content to the end of the file
    AppendIfMissing {
        file: PathBuf,
        idempotency_key: String,
        content: String,
    },
}

/// Discriminant of a [`PatchOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    MarkerInsert,
    MarkerReplace,
    AppendIfMissing,
}

impl PatchOperation {
    pub fn kind(&self) -> PatchKind {
        match self {
            PatchOperation::MarkerInsert { .. } => PatchKind::MarkerInsert,
            PatchOperation::MarkerReplace { .. } => PatchKind::MarkerReplace,
            PatchOperation::AppendIfMissing { .. } => PatchKind::AppendIfMissing,
        }
    }

    /// File to patch, relative to the target root
    pub fn file(&self) -> &Path {
        match self {
            PatchOperation::MarkerInsert { file, .. }
            | PatchOperation::MarkerReplace { file, .. }
            | PatchOperation::AppendIfMissing { file, .. } => file,
        }
    }

    pub fn idempotency_key(&self) -> &str {
        match self {
            PatchOperation::MarkerInsert {
                idempotency_key, ..
            }
            | PatchOperation::MarkerReplace {
                idempotency_key, ..
            }
            | PatchOperation::AppendIfMissing {
                idempotency_key, ..
            } => idempotency_key,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            PatchOperation::MarkerInsert { content, .. }
            | PatchOperation::MarkerReplace { content, .. }
            | PatchOperation::AppendIfMissing { content, .. } => content,
        }
    }

    /// `(start, end)` markers for marker-delimited operations
    pub fn markers(&self) -> Option<(&str, &str)> {
        match self {
            PatchOperation::MarkerInsert {
                marker_start,
                marker_end,
                ..
            }
            | PatchOperation::MarkerReplace {
                marker_start,
                marker_end,
                ..
            } => Some((marker_start, marker_end)),
            PatchOperation::AppendIfMissing { .. } => None,
        }
    }
}

/// Why an operation was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The stamp for this key is already in the file
    AlreadyApplied,
    /// A marker is missing (non-strict mode)
    MarkerNotFound,
    /// The file is missing (non-strict mode)
    FileNotFound,
}

/// Outcome of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PatchStatus {
    Applied,
    Skipped(SkipReason),
    Failed(String),
}

/// Result of applying one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchResult {
    /// Position of the operation in its batch
    pub index: usize,
    pub file: PathBuf,
    pub idempotency_key: String,
    pub kind: PatchKind,
    pub status: PatchStatus,
}

impl PatchResult {
    pub(crate) fn new(index: usize, operation: &PatchOperation, status: PatchStatus) -> Self {
        Self {
            index,
            file: operation.file().to_path_buf(),
            idempotency_key: operation.idempotency_key().to_string(),
            kind: operation.kind(),
            status,
        }
    }
}

/// Per-operation results of a batch plus totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchApplySummary {
    pub results: Vec<PatchResult>,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PatchApplySummary {
    pub(crate) fn record(&mut self, result: PatchResult) {
        match result.status {
            PatchStatus::Applied => self.applied += 1,
            PatchStatus::Skipped(_) => self.skipped += 1,
            PatchStatus::Failed(_) => self.failed += 1,
        }
        self.results.push(result);
    }

    /// Whether any operation failed
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Engine behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOptions {
    /// Missing markers and files are errors rather than skips
    pub strict: bool,
    /// Applied to the whole file after patching
    pub line_endings: LineEndingPolicy,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            strict: true,
            line_endings: LineEndingPolicy::Preserve,
        }
    }
}
