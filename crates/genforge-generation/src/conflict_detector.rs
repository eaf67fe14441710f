//! Conflict detection for generated files
//!
//! A pre-flight gate: given the relative paths a run would produce, report
//! which ones already exist in the target. Nothing is rendered or read.

use std::path::{Path, PathBuf};

use genforge_files::resolve_within;
use tracing::debug;

use crate::error::GenerationError;
use crate::models::{Conflict, ConflictReport};

/// Detects existing output files before writing
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    /// Create a new conflict detector
    pub fn new() -> Self {
        Self
    }

    /// Report which of `relative_paths` exist under `target_dir`
    ///
    /// Symlinks count as existing even when dangling.
    pub fn detect(
        &self,
        target_dir: &Path,
        relative_paths: &[PathBuf],
    ) -> Result<ConflictReport, GenerationError> {
        let mut conflicts = Vec::new();

        for relative in relative_paths {
            let absolute = resolve_within(target_dir, relative)?;
            if std::fs::symlink_metadata(&absolute).is_ok() {
                debug!("Conflict: {} already exists", absolute.display());
                conflicts.push(Conflict {
                    relative_path: relative.clone(),
                    absolute_path: absolute,
                });
            }
        }

        Ok(ConflictReport {
            count: conflicts.len(),
            conflicts,
        })
    }

    /// Turn a non-empty report into `OutputConflict`
    pub fn ensure_clear(&self, report: &ConflictReport) -> Result<(), GenerationError> {
        if report.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::OutputConflict {
                paths: report.paths(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_existing_files_only() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/lib.rs"), "").unwrap();

        let report = ConflictDetector::new()
            .detect(
                temp.path(),
                &[PathBuf::from("src/lib.rs"), PathBuf::from("README.md")],
            )
            .unwrap();

        assert_eq!(report.count, 1);
        assert_eq!(report.conflicts[0].relative_path, PathBuf::from("src/lib.rs"));
        assert_eq!(report.conflicts[0].absolute_path, temp.path().join("src/lib.rs"));
    }

    #[test]
    fn test_missing_target_has_no_conflicts() {
        let temp = tempfile::tempdir().unwrap();
        let report = ConflictDetector::new()
            .detect(&temp.path().join("nope"), &[PathBuf::from("a")])
            .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_escaping_path_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let result = ConflictDetector::new().detect(temp.path(), &[PathBuf::from("../x")]);
        assert!(matches!(result, Err(GenerationError::File(_))));
    }

    #[test]
    fn test_ensure_clear() {
        let detector = ConflictDetector::new();
        assert!(detector.ensure_clear(&ConflictReport::default()).is_ok());

        let report = ConflictReport {
            count: 1,
            conflicts: vec![Conflict {
                relative_path: PathBuf::from("a.txt"),
                absolute_path: PathBuf::from("/t/a.txt"),
            }],
        };
        match detector.ensure_clear(&report) {
            Err(GenerationError::OutputConflict { paths }) => {
                assert_eq!(paths, vec![PathBuf::from("a.txt")])
            }
            other => panic!("Expected OutputConflict, got {:?}", other),
        }
    }
}
