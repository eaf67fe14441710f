//! Patch engine
//!
//! Applies [`PatchOperation`]s to files under a target root. Every write goes
//! through [`SafeWriter`], so a file is either fully patched or untouched.

use std::path::Path;

use genforge_files::line_endings::convert;
use genforge_files::{resolve_within, LineEnding, SafeWriter};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::PatchError;
use crate::models::{
    PatchApplySummary, PatchOperation, PatchOptions, PatchResult, PatchStatus, SkipReason,
};
use crate::stamp::IdempotencyStamp;

/// Applies patch operations idempotently
#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    options: PatchOptions,
    writer: SafeWriter,
}

/// Byte ranges of a located marker pair
struct MarkerSpan {
    /// End of the start marker
    after_start: usize,
    /// Beginning of the end marker
    end_at: usize,
}

impl PatchEngine {
    pub fn new(options: PatchOptions) -> Self {
        Self {
            options,
            writer: SafeWriter::new(),
        }
    }

    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Apply a single operation to a file under `target_root`
    ///
    /// Returns `Applied` or a `Skipped` status. In strict mode missing markers
    /// and files are errors; otherwise they are reported as skips.
    pub async fn apply(
        &self,
        target_root: &Path,
        index: usize,
        operation: &PatchOperation,
    ) -> Result<PatchResult, PatchError> {
        validate(operation)?;

        let path = resolve_within(target_root, operation.file())?;
        let stamp = IdempotencyStamp::new(operation.idempotency_key());

        let existing = match fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(PatchError::Io(e)),
        };

        let status = match existing {
            Some(content) if stamp.is_present_in(&content) => {
                debug!(
                    "Patch {} already applied to {}",
                    operation.idempotency_key(),
                    path.display()
                );
                PatchStatus::Skipped(SkipReason::AlreadyApplied)
            }
            Some(content) => match self.patched_content(&path, &content, &stamp, operation)? {
                Some(patched) => {
                    self.writer.write(&path, patched.as_bytes()).await?;
                    PatchStatus::Applied
                }
                None => PatchStatus::Skipped(SkipReason::MarkerNotFound),
            },
            None => self.apply_to_missing(&path, &stamp, operation).await?,
        };

        if status == PatchStatus::Applied {
            debug!(
                "Applied patch {} to {}",
                operation.idempotency_key(),
                path.display()
            );
        }

        Ok(PatchResult::new(index, operation, status))
    }

    /// Apply operations in order, continuing past failures
    pub async fn apply_all(
        &self,
        target_root: &Path,
        operations: &[PatchOperation],
    ) -> PatchApplySummary {
        let mut summary = PatchApplySummary::default();

        for (index, operation) in operations.iter().enumerate() {
            let result = match self.apply(target_root, index, operation).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        "Patch {} on {} failed: {}",
                        operation.idempotency_key(),
                        operation.file().display(),
                        e
                    );
                    PatchResult::new(index, operation, PatchStatus::Failed(e.to_string()))
                }
            };
            summary.record(result);
        }

        info!(
            "Patched {} files: {} applied, {} skipped, {} failed",
            operations.len(),
            summary.applied,
            summary.skipped,
            summary.failed
        );
        summary
    }

    async fn apply_to_missing(
        &self,
        path: &Path,
        stamp: &IdempotencyStamp,
        operation: &PatchOperation,
    ) -> Result<PatchStatus, PatchError> {
        if self.options.strict {
            return Err(PatchError::FileNotFound(path.to_path_buf()));
        }

        match operation {
            PatchOperation::AppendIfMissing { content, .. } => {
                let ending = LineEnding::Lf;
                let body = format!(
                    "{}{nl}{}{nl}",
                    stamp.render_for(path),
                    prepare(content, ending),
                    nl = ending.as_str()
                );
                let body = self.options.line_endings.apply(&body);
                self.writer.write(path, body.as_bytes()).await?;
                Ok(PatchStatus::Applied)
            }
            PatchOperation::MarkerInsert { .. } | PatchOperation::MarkerReplace { .. } => {
                debug!("Skipping patch on missing file {}", path.display());
                Ok(PatchStatus::Skipped(SkipReason::FileNotFound))
            }
        }
    }

    /// Compute the patched file body, or `None` when a marker is missing in
    /// non-strict mode
    fn patched_content(
        &self,
        path: &Path,
        existing: &str,
        stamp: &IdempotencyStamp,
        operation: &PatchOperation,
    ) -> Result<Option<String>, PatchError> {
        let ending = LineEnding::detect(existing);
        let nl = ending.as_str();
        let stamp_line = stamp.render_for(path);

        let patched = match operation {
            PatchOperation::MarkerInsert {
                marker_start,
                marker_end,
                content,
                ..
            } => {
                let Some(span) = self.locate(path, existing, marker_start, marker_end)? else {
                    return Ok(None);
                };
                let mut out = String::with_capacity(existing.len() + content.len() + 64);
                out.push_str(&existing[..span.after_start]);
                out.push_str(nl);
                out.push_str(&stamp_line);
                out.push_str(nl);
                out.push_str(&prepare(content, ending));
                out.push_str(&existing[span.after_start..]);
                out
            }
            PatchOperation::MarkerReplace {
                marker_start,
                marker_end,
                content,
                ..
            } => {
                let Some(span) = self.locate(path, existing, marker_start, marker_end)? else {
                    return Ok(None);
                };
                let mut out = String::with_capacity(existing.len() + content.len() + 64);
                out.push_str(&existing[..span.after_start]);
                out.push_str(nl);
                out.push_str(&stamp_line);
                out.push_str(nl);
                out.push_str(&prepare(content, ending));
                out.push_str(nl);
                out.push_str(&existing[span.end_at..]);
                out
            }
            PatchOperation::AppendIfMissing { content, .. } => {
                let mut out = existing.to_string();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push_str(nl);
                }
                out.push_str(&stamp_line);
                out.push_str(nl);
                out.push_str(&prepare(content, ending));
                out.push_str(nl);
                out
            }
        };

        Ok(Some(self.options.line_endings.apply(&patched)))
    }

    /// Find the first start marker and the nearest end marker after it
    fn locate(
        &self,
        path: &Path,
        content: &str,
        start: &str,
        end: &str,
    ) -> Result<Option<MarkerSpan>, PatchError> {
        let Some(start_at) = content.find(start) else {
            return self.missing_marker(path, start);
        };
        let after_start = start_at + start.len();

        match content[after_start..].find(end) {
            Some(offset) => Ok(Some(MarkerSpan {
                after_start,
                end_at: after_start + offset,
            })),
            None if content[..after_start].contains(end) => {
                if self.options.strict {
                    Err(PatchError::MarkerOrder {
                        file: path.to_path_buf(),
                        start: start.to_string(),
                        end: end.to_string(),
                    })
                } else {
                    debug!("Markers out of order in {}", path.display());
                    Ok(None)
                }
            }
            None => self.missing_marker(path, end),
        }
    }

    fn missing_marker(&self, path: &Path, marker: &str) -> Result<Option<MarkerSpan>, PatchError> {
        if self.options.strict {
            Err(PatchError::MarkerNotFound {
                file: path.to_path_buf(),
                marker: marker.to_string(),
            })
        } else {
            debug!("Marker {:?} not found in {}", marker, path.display());
            Ok(None)
        }
    }
}

fn validate(operation: &PatchOperation) -> Result<(), PatchError> {
    if operation.idempotency_key().trim().is_empty() {
        return Err(PatchError::InvalidOperation(format!(
            "empty idempotency key for {}",
            operation.file().display()
        )));
    }
    if operation.idempotency_key().contains(['[', ']']) {
        return Err(PatchError::InvalidOperation(format!(
            "idempotency key {:?} may not contain brackets",
            operation.idempotency_key()
        )));
    }
    if operation.content().is_empty() {
        return Err(PatchError::ContentMissing {
            key: operation.idempotency_key().to_string(),
        });
    }
    if let Some((start, end)) = operation.markers() {
        if start.is_empty() || end.is_empty() {
            return Err(PatchError::InvalidOperation(format!(
                "empty marker in patch {}",
                operation.idempotency_key()
            )));
        }
    }
    Ok(())
}

/// Trim trailing newlines and convert to the file's line-ending style
fn prepare(content: &str, ending: LineEnding) -> String {
    convert(content.trim_end_matches(['\n', '\r']), ending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use genforge_files::{FileError, LineEndingPolicy};
    use tempfile::TempDir;

    fn insert(file: &str, key: &str, content: &str) -> PatchOperation {
        PatchOperation::MarkerInsert {
            file: PathBuf::from(file),
            idempotency_key: key.to_string(),
            marker_start: "// A".to_string(),
            marker_end: "// B".to_string(),
            content: content.to_string(),
        }
    }

    fn replace(file: &str, key: &str, content: &str) -> PatchOperation {
        PatchOperation::MarkerReplace {
            file: PathBuf::from(file),
            idempotency_key: key.to_string(),
            marker_start: "// A".to_string(),
            marker_end: "// B".to_string(),
            content: content.to_string(),
        }
    }

    fn append(file: &str, key: &str, content: &str) -> PatchOperation {
        PatchOperation::AppendIfMissing {
            file: PathBuf::from(file),
            idempotency_key: key.to_string(),
            content: content.to_string(),
        }
    }

    async fn setup(name: &str, content: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(name), content).await.unwrap();
        temp
    }

    async fn read(temp: &TempDir, name: &str) -> String {
        fs::read_to_string(temp.path().join(name)).await.unwrap()
    }

    #[tokio::test]
    async fn test_marker_insert_then_skip() {
        let temp = setup("app.ts", "// A\n// B").await;
        let engine = PatchEngine::default();

        let first = engine.apply(temp.path(), 0, &insert("app.ts", "k1", "X();")).await.unwrap();
        assert_eq!(first.status, PatchStatus::Applied);
        assert_eq!(
            read(&temp, "app.ts").await,
            "// A\n// genforge:patch[k1]\nX();\n// B"
        );

        let second = engine.apply(temp.path(), 0, &insert("app.ts", "k1", "X();")).await.unwrap();
        assert_eq!(second.status, PatchStatus::Skipped(SkipReason::AlreadyApplied));
        assert_eq!(
            read(&temp, "app.ts").await,
            "// A\n// genforge:patch[k1]\nX();\n// B"
        );
    }

    #[tokio::test]
    async fn test_marker_replace_keeps_markers() {
        let temp = setup("app.ts", "head\n// A\nold();\nolder();\n// B\ntail\n").await;
        let engine = PatchEngine::default();

        engine.apply(temp.path(), 0, &replace("app.ts", "r1", "new();\n")).await.unwrap();

        assert_eq!(
            read(&temp, "app.ts").await,
            "head\n// A\n// genforge:patch[r1]\nnew();\n// B\ntail\n"
        );
    }

    #[tokio::test]
    async fn test_end_marker_searched_after_start() {
        let temp = setup("app.ts", "// B\n// A\nbody\n// B\n").await;
        let engine = PatchEngine::default();

        engine.apply(temp.path(), 0, &replace("app.ts", "r1", "new")).await.unwrap();

        assert_eq!(
            read(&temp, "app.ts").await,
            "// B\n// A\n// genforge:patch[r1]\nnew\n// B\n"
        );
    }

    #[tokio::test]
    async fn test_end_marker_only_before_start() {
        let temp = setup("app.ts", "// B\n// A\n").await;
        let engine = PatchEngine::default();

        let result = engine.apply(temp.path(), 0, &insert("app.ts", "k", "x")).await;
        assert!(matches!(result, Err(PatchError::MarkerOrder { .. })));
    }

    #[tokio::test]
    async fn test_append_adds_single_newline() {
        let temp = setup(".gitignore", "target").await;
        let engine = PatchEngine::default();

        engine.apply(temp.path(), 0, &append(".gitignore", "ig", "node_modules/")).await.unwrap();

        assert_eq!(
            read(&temp, ".gitignore").await,
            "target\n# genforge:patch[ig]\nnode_modules/\n"
        );
    }

    #[tokio::test]
    async fn test_append_to_file_ending_with_newline() {
        let temp = setup("notes.md", "# Notes\n").await;
        let engine = PatchEngine::default();

        engine.apply(temp.path(), 0, &append("notes.md", "n", "More\n\n")).await.unwrap();

        assert_eq!(
            read(&temp, "notes.md").await,
            "# Notes\n<!-- genforge:patch[n] -->\nMore\n"
        );
    }

    #[tokio::test]
    async fn test_crlf_file_keeps_crlf() {
        let temp = setup("app.ts", "// A\r\n// B\r\n").await;
        let engine = PatchEngine::default();

        engine.apply(temp.path(), 0, &insert("app.ts", "k", "a();\nb();")).await.unwrap();

        assert_eq!(
            read(&temp, "app.ts").await,
            "// A\r\n// genforge:patch[k]\r\na();\r\nb();\r\n// B\r\n"
        );
    }

    #[tokio::test]
    async fn test_forced_lf_policy() {
        let temp = setup("app.ts", "// A\r\n// B\r\n").await;
        let engine = PatchEngine::new(PatchOptions {
            strict: true,
            line_endings: LineEndingPolicy::Lf,
        });

        engine.apply(temp.path(), 0, &insert("app.ts", "k", "a();")).await.unwrap();

        assert_eq!(
            read(&temp, "app.ts").await,
            "// A\n// genforge:patch[k]\na();\n// B\n"
        );
    }

    #[tokio::test]
    async fn test_strict_missing_marker() {
        let temp = setup("app.ts", "nothing here").await;
        let engine = PatchEngine::default();

        let result = engine.apply(temp.path(), 0, &insert("app.ts", "k", "x")).await;
        match result {
            Err(PatchError::MarkerNotFound { marker, .. }) => assert_eq!(marker, "// A"),
            other => panic!("Expected MarkerNotFound, got {:?}", other),
        }
        assert_eq!(read(&temp, "app.ts").await, "nothing here");
    }

    #[tokio::test]
    async fn test_strict_missing_end_marker() {
        let temp = setup("app.ts", "// A\n").await;
        let engine = PatchEngine::default();

        let result = engine.apply(temp.path(), 0, &insert("app.ts", "k", "x")).await;
        assert!(
            matches!(result, Err(PatchError::MarkerNotFound { ref marker, .. }) if marker == "// B")
        );
    }

    #[tokio::test]
    async fn test_lenient_missing_marker_skips() {
        let temp = setup("app.ts", "nothing here").await;
        let engine = PatchEngine::new(PatchOptions {
            strict: false,
            ..PatchOptions::default()
        });

        let result = engine.apply(temp.path(), 0, &insert("app.ts", "k", "x")).await.unwrap();
        assert_eq!(result.status, PatchStatus::Skipped(SkipReason::MarkerNotFound));
    }

    #[tokio::test]
    async fn test_missing_file_strict_and_lenient() {
        let temp = TempDir::new().unwrap();

        let strict = PatchEngine::default();
        let result = strict.apply(temp.path(), 0, &append("new.txt", "k", "x")).await;
        assert!(matches!(result, Err(PatchError::FileNotFound(_))));

        let lenient = PatchEngine::new(PatchOptions {
            strict: false,
            ..PatchOptions::default()
        });
        let skipped = lenient.apply(temp.path(), 0, &insert("gone.ts", "k", "x")).await.unwrap();
        assert_eq!(skipped.status, PatchStatus::Skipped(SkipReason::FileNotFound));

        let created = lenient.apply(temp.path(), 0, &append("new.txt", "k", "x")).await.unwrap();
        assert_eq!(created.status, PatchStatus::Applied);
        assert_eq!(read(&temp, "new.txt").await, "# genforge:patch[k]\nx\n");
    }

    #[tokio::test]
    async fn test_validation() {
        let temp = TempDir::new().unwrap();
        let engine = PatchEngine::default();

        let result = engine.apply(temp.path(), 0, &append("a.txt", " ", "x")).await;
        assert!(matches!(result, Err(PatchError::InvalidOperation(_))));

        let result = engine.apply(temp.path(), 0, &append("a.txt", "k", "")).await;
        assert!(matches!(result, Err(PatchError::ContentMissing { .. })));
    }

    #[tokio::test]
    async fn test_bracketed_key_cannot_shadow_another_key() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "start\n").await.unwrap();
        let engine = PatchEngine::default();

        let result = engine.apply(temp.path(), 0, &append("a.txt", "a]", "x")).await;
        assert!(matches!(result, Err(PatchError::InvalidOperation(_))));
        assert_eq!(read(&temp, "a.txt").await, "start\n");

        let applied = engine.apply(temp.path(), 1, &append("a.txt", "a", "y")).await.unwrap();
        assert_eq!(applied.status, PatchStatus::Applied);
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = PatchEngine::default();

        let result = engine.apply(temp.path(), 0, &append("../evil.txt", "k", "x")).await;
        assert!(matches!(
            result,
            Err(PatchError::File(FileError::PathEscape { .. }))
        ));
    }

    #[tokio::test]
    async fn test_apply_all_continues_past_failures() {
        let temp = setup("app.ts", "// A\n// B\n").await;
        let engine = PatchEngine::default();
        let ops = vec![
            insert("missing.ts", "m", "x"),
            insert("app.ts", "k1", "one();"),
            insert("app.ts", "k1", "one();"),
            append("app.ts", "k2", "two();"),
        ];

        let summary = engine.apply_all(temp.path(), &ops).await;

        assert_eq!((summary.applied, summary.skipped, summary.failed), (2, 1, 1));
        assert!(matches!(summary.results[0].status, PatchStatus::Failed(_)));
        assert_eq!(summary.results[3].index, 3);
        assert_eq!(
            read(&temp, "app.ts").await,
            "// A\n// genforge:patch[k1]\none();\n// B\n// genforge:patch[k2]\ntwo();\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_patch_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = setup("run.sh", "#!/bin/sh\n").await;
        let path = temp.path().join("run.sh");
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .await
            .unwrap();

        PatchEngine::default()
            .apply(temp.path(), 0, &append("run.sh", "k", "echo hi"))
            .await
            .unwrap();

        let mode = fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
