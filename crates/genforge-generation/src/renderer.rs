//! Template tree rendering
//!
//! A render runs in three passes so that a failure never leaves a partial
//! batch behind:
//! 1. plan every destination (path rewriting, exclusion) and read whatever
//!    already sits there (overwrite check, unusable destinations)
//! 2. render every text file in memory
//! 3. write, one atomic replacement per file

use std::path::{Path, PathBuf};

use genforge_files::{line_endings, to_slash_string, LineEndingPolicy, SafeWriter};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::binary::BinaryClassifier;
use crate::error::GenerationError;
use crate::models::{FileEntry, FileMode, RenameRuleSet, RenderOptions, RenderResult, TemplateEntry};
use crate::path_rewriter::PathRewriter;
use crate::templates::{TemplateEngine, TemplateLoader};

/// A template file with its computed destination
#[derive(Debug, Clone)]
pub(crate) struct PlannedOutput {
    pub entry: TemplateEntry,
    pub relative: PathBuf,
    pub absolute: PathBuf,
}

/// One step of a render plan, in discovery order
#[derive(Debug, Clone)]
pub(crate) enum PlanItem {
    Output(PlannedOutput),
    Skipped(TemplateEntry),
}

/// Content produced for one output
#[derive(Debug, Clone)]
pub(crate) struct Produced {
    pub mode: FileMode,
    pub content: Vec<u8>,
}

impl Produced {
    /// Whether `existing` already holds this output
    ///
    /// Under the `Preserve` policy rendered text is compared modulo line
    /// endings; a forced `lf`/`crlf` policy and copied files compare bytes.
    pub fn matches(&self, existing: &[u8], policy: LineEndingPolicy) -> bool {
        match self.mode {
            FileMode::Rendered if policy == LineEndingPolicy::Preserve => match (
                std::str::from_utf8(&self.content),
                std::str::from_utf8(existing),
            ) {
                (Ok(new), Ok(old)) => line_endings::equivalent(new, old),
                _ => self.content == existing,
            },
            _ => self.content == existing,
        }
    }
}

/// Renders template trees into an output directory
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    engine: TemplateEngine,
    writer: SafeWriter,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `template_dir` into `target_dir`
    ///
    /// Without `force`, any existing destination fails the whole render with
    /// `FileExists` before anything is written. With `force`, every existing
    /// destination is reported as overwritten; those already equal to the
    /// output (modulo line endings) are left untouched on disk.
    pub async fn render(
        &self,
        template_dir: &Path,
        target_dir: &Path,
        context: &Value,
        rules: &RenameRuleSet,
        options: &RenderOptions,
    ) -> Result<RenderResult, GenerationError> {
        let plan = self.plan(template_dir, target_dir, rules, options)?;

        let mut current = Vec::with_capacity(plan.len());
        for item in &plan {
            current.push(match item {
                PlanItem::Output(output) => {
                    if !options.force && fs::symlink_metadata(&output.absolute).await.is_ok() {
                        return Err(GenerationError::FileExists(output.relative.clone()));
                    }
                    read_existing(&output.relative, &output.absolute).await?
                }
                PlanItem::Skipped(_) => None,
            });
        }

        let mut produced = Vec::with_capacity(plan.len());
        for item in &plan {
            produced.push(match item {
                PlanItem::Output(output) => Some(self.produce(output, context, options).await?),
                PlanItem::Skipped(_) => None,
            });
        }

        let mut result = RenderResult {
            dry_run: options.dry_run,
            ..RenderResult::default()
        };

        for ((item, produced), current) in plan.into_iter().zip(produced).zip(current) {
            let (output, produced) = match (item, produced) {
                (PlanItem::Output(output), Some(produced)) => (output, produced),
                (PlanItem::Skipped(entry), _) => {
                    debug!("Skipping excluded template {}", entry.source_relative_path.display());
                    result.files.push(FileEntry {
                        destination_relative_path: entry.source_relative_path.clone(),
                        source_relative_path: entry.source_relative_path,
                        destination_absolute_path: None,
                        mode: FileMode::Skipped,
                    });
                    continue;
                }
                (PlanItem::Output(_), None) => continue,
            };

            match current {
                None => {
                    if !options.dry_run {
                        self.write(&output, &produced).await?;
                    }
                    result.files_created.push(output.relative.clone());
                }
                Some(existing) => {
                    if produced.matches(&existing, options.line_endings) {
                        debug!("{} is unchanged", output.relative.display());
                        result.files_unchanged.push(output.relative.clone());
                    } else if !options.dry_run {
                        self.write(&output, &produced).await?;
                    }
                    result.files_overwritten.push(output.relative.clone());
                }
            }

            result.files.push(FileEntry {
                source_relative_path: output.entry.source_relative_path,
                destination_relative_path: output.relative,
                destination_absolute_path: Some(output.absolute),
                mode: produced.mode,
            });
        }

        info!(
            "{} {} files into {} ({} created, {} overwritten, {} unchanged)",
            if options.dry_run { "Planned" } else { "Rendered" },
            result.files.len(),
            target_dir.display(),
            result.files_created.len(),
            result.files_overwritten.len(),
            result.files_unchanged.len()
        );

        Ok(result)
    }

    /// Discover the template tree and compute every destination
    pub(crate) fn plan(
        &self,
        template_dir: &Path,
        target_dir: &Path,
        rules: &RenameRuleSet,
        options: &RenderOptions,
    ) -> Result<Vec<PlanItem>, GenerationError> {
        let loader = TemplateLoader::new(BinaryClassifier::new(options.binary_sniff_bytes));
        let entries = loader.discover(template_dir)?;
        let excludes = build_exclude_set(&options.exclude)?;
        let rewriter = PathRewriter::new(rules);

        let mut plan = Vec::with_capacity(entries.len());
        for entry in entries {
            if excludes.is_match(to_slash_string(&entry.source_relative_path)) {
                plan.push(PlanItem::Skipped(entry));
                continue;
            }

            let (relative, absolute) =
                rewriter.destination(&entry.source_relative_path, target_dir)?;
            plan.push(PlanItem::Output(PlannedOutput {
                entry,
                relative,
                absolute,
            }));
        }

        Ok(plan)
    }

    /// Produce the output bytes for one planned file
    ///
    /// Binary files and text files that are not valid UTF-8 are copied as is.
    pub(crate) async fn produce(
        &self,
        output: &PlannedOutput,
        context: &Value,
        options: &RenderOptions,
    ) -> Result<Produced, GenerationError> {
        let raw = fs::read(&output.entry.source_path).await?;

        if output.entry.is_binary {
            return Ok(Produced {
                mode: FileMode::Copied,
                content: raw,
            });
        }

        let source = match String::from_utf8(raw) {
            Ok(source) => source,
            Err(e) => {
                debug!(
                    "{} is not UTF-8, copying verbatim",
                    output.entry.source_relative_path.display()
                );
                return Ok(Produced {
                    mode: FileMode::Copied,
                    content: e.into_bytes(),
                });
            }
        };

        let rendered = self.engine.render(&source, context).map_err(|message| {
            GenerationError::TemplateRenderError {
                path: output.entry.source_relative_path.clone(),
                message,
            }
        })?;

        Ok(Produced {
            mode: FileMode::Rendered,
            content: options.line_endings.apply(&rendered).into_bytes(),
        })
    }

    /// Swap staged outputs that are equivalent to the file already at the same
    /// place under `target_dir` for that file
    ///
    /// After a forced commit those files are then byte-for-byte what they were.
    /// Returns the destination-relative paths that were kept.
    pub(crate) async fn keep_equivalent(
        &self,
        staged: &RenderResult,
        staging_dir: &Path,
        target_dir: &Path,
        policy: LineEndingPolicy,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        let mut kept = Vec::new();
        if !fs::metadata(target_dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Ok(kept);
        }

        for file in staged.files.iter().filter(|f| f.mode != FileMode::Skipped) {
            let relative = &file.destination_relative_path;
            let current_path = target_dir.join(relative);
            // Anything unreadable there is replaced wholesale by the commit
            let Ok(current) = fs::read(&current_path).await else {
                continue;
            };

            let staged_path = staging_dir.join(relative);
            let produced = Produced {
                mode: file.mode,
                content: fs::read(&staged_path).await?,
            };
            if produced.matches(&current, policy) {
                fs::copy(&current_path, &staged_path).await?;
                debug!("Keeping existing {}", relative.display());
                kept.push(relative.clone());
            }
        }

        Ok(kept)
    }

    async fn write(&self, output: &PlannedOutput, produced: &Produced) -> Result<(), GenerationError> {
        self.writer
            .write_with_mode(
                &output.absolute,
                &produced.content,
                output.entry.permission_mode,
            )
            .await?;
        Ok(())
    }
}

/// Contents of the destination at `absolute`, or `None` if nothing is there
///
/// A destination that cannot be read as a file (a directory, or a path
/// through an existing file) fails with `DestinationUnavailable`.
pub(crate) async fn read_existing(
    relative: &Path,
    absolute: &Path,
) -> Result<Option<Vec<u8>>, GenerationError> {
    match fs::read(absolute).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(GenerationError::DestinationUnavailable {
            path: relative.to_path_buf(),
            source,
        }),
    }
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet, GenerationError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| GenerationError::InvalidExcludePattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| GenerationError::InvalidExcludePattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })
}
