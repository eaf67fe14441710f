//! Core data models for generation runs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use genforge_files::{CommitOutcome, LineEndingPolicy};
use genforge_patch::{PatchApplySummary, PatchOperation};
use serde::{Deserialize, Serialize};

pub use genforge_config::DEFAULT_BINARY_SNIFF_BYTES;

/// A file discovered in a template tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// Path relative to the template root
    pub source_relative_path: PathBuf,
    /// Absolute path of the template file
    pub source_path: PathBuf,
    /// Copied as opaque bytes instead of rendered
    pub is_binary: bool,
    /// Unix permission bits of the template file
    pub permission_mode: Option<u32>,
}

/// Placeholder → replacement rules for output paths
///
/// Keys are applied longest first; keys of equal length in lexicographic
/// order. Empty keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameRuleSet {
    rules: BTreeMap<String, String>,
}

impl RenameRuleSet {
    /// Creates an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a rule
    pub fn insert(&mut self, placeholder: impl Into<String>, replacement: impl Into<String>) {
        self.rules.insert(placeholder.into(), replacement.into());
    }

    /// Builder-style [`RenameRuleSet::insert`]
    pub fn with(mut self, placeholder: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.insert(placeholder, replacement);
        self
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in application order
    pub fn ordered(&self) -> Vec<(&str, &str)> {
        // BTreeMap iteration is lexicographic, and the sort is stable
        let mut ordered: Vec<(&str, &str)> = self
            .rules
            .iter()
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        ordered
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RenameRuleSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut rules = RenameRuleSet::new();
        for (key, value) in iter {
            rules.insert(key, value);
        }
        rules
    }
}

/// How a template file ends up in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    /// Rendered through the template engine
    Rendered,
    /// Copied byte for byte
    Copied,
    /// Excluded by a glob; not written
    Skipped,
}

/// One template file's output decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the template root
    pub source_relative_path: PathBuf,
    /// Path relative to the output root
    pub destination_relative_path: PathBuf,
    /// Absolute output path; `None` for skipped entries
    pub destination_absolute_path: Option<PathBuf>,
    /// Rendered, copied or skipped
    pub mode: FileMode,
}

/// Options for [`crate::TemplateRenderer::render`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Overwrite existing output files
    pub force: bool,
    /// Plan and render in memory only
    pub dry_run: bool,
    /// Globs, relative to the template root, that are never rendered
    pub exclude: Vec<String>,
    /// Line-ending policy for rendered text
    pub line_endings: LineEndingPolicy,
    /// Leading bytes inspected when classifying binary files
    pub binary_sniff_bytes: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            exclude: Vec::new(),
            line_endings: LineEndingPolicy::Preserve,
            binary_sniff_bytes: DEFAULT_BINARY_SNIFF_BYTES,
        }
    }
}

/// Outcome of a render
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderResult {
    /// Every template file's decision, in discovery order
    pub files: Vec<FileEntry>,
    /// Destinations that did not exist before
    pub files_created: Vec<PathBuf>,
    /// Existing destinations taken over by a forced render
    pub files_overwritten: Vec<PathBuf>,
    /// Overwritten destinations already equal to the output (modulo line
    /// endings), left as they were
    pub files_unchanged: Vec<PathBuf>,
    /// Nothing was written
    pub dry_run: bool,
}

impl RenderResult {
    /// Destination-relative paths of every written (or planned) file
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| f.mode != FileMode::Skipped)
            .map(|f| f.destination_relative_path.clone())
            .collect()
    }

    /// Re-point absolute destinations from `from` to `to`
    ///
    /// Used after a staging directory has been committed to its target.
    pub fn rebase(&mut self, from: &Path, to: &Path) {
        for file in &mut self.files {
            if let Some(abs) = &file.destination_absolute_path {
                if let Ok(rel) = abs.strip_prefix(from) {
                    file.destination_absolute_path = Some(to.join(rel));
                }
            }
        }
    }
}

/// Dry-run classification of one output path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewOperation {
    /// The file does not exist yet
    Create,
    /// The file exists with different content
    Modify,
    /// The file exists with equivalent content
    Noop,
}

/// Preview of one output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewFile {
    /// Destination-relative path
    pub relative_path: PathBuf,
    /// Absolute destination path
    pub absolute_path: PathBuf,
    pub operation: PreviewOperation,
    pub is_binary: bool,
    /// Template-relative source path
    pub source_template: PathBuf,
}

/// Per-operation totals of a preview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewCounts {
    pub create: usize,
    pub modify: usize,
    pub noop: usize,
    pub total: usize,
}

/// Result of a dry-run preview
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewReport {
    pub files: Vec<PreviewFile>,
    pub counts: PreviewCounts,
    pub creates: Vec<PathBuf>,
    pub modifies: Vec<PathBuf>,
    pub noops: Vec<PathBuf>,
    /// At least one existing file would change
    pub has_modifications: bool,
}

impl PreviewReport {
    /// Build a report with counts and buckets derived from `files`
    pub fn from_files(files: Vec<PreviewFile>) -> Self {
        let mut report = PreviewReport::default();

        for file in &files {
            let bucket = match file.operation {
                PreviewOperation::Create => {
                    report.counts.create += 1;
                    &mut report.creates
                }
                PreviewOperation::Modify => {
                    report.counts.modify += 1;
                    &mut report.modifies
                }
                PreviewOperation::Noop => {
                    report.counts.noop += 1;
                    &mut report.noops
                }
            };
            bucket.push(file.relative_path.clone());
        }

        report.counts.total = files.len();
        report.has_modifications = report.counts.modify > 0;
        report.files = files;
        report
    }
}

/// An output path that already exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
}

/// Existing output paths found by [`crate::ConflictDetector`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub count: usize,
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Destination-relative paths of all conflicts
    pub fn paths(&self) -> Vec<PathBuf> {
        self.conflicts
            .iter()
            .map(|c| c.relative_path.clone())
            .collect()
    }
}

/// Everything needed for one generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub template_dir: PathBuf,
    pub target_dir: PathBuf,
    /// Values passed to the template engine (a JSON object)
    pub context: serde_json::Value,
    #[serde(default)]
    pub rename_rules: RenameRuleSet,
    /// Replace an existing target directory
    #[serde(default)]
    pub force: bool,
    /// Check for existing outputs before staging anything
    #[serde(default)]
    pub preflight: bool,
    /// Applied to the committed target, in order
    #[serde(default)]
    pub patches: Vec<PatchOperation>,
}

impl GenerationRequest {
    /// A request with an empty context and no rules, patches or force
    pub fn new(template_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            target_dir: target_dir.into(),
            context: serde_json::Value::Object(serde_json::Map::new()),
            rename_rules: RenameRuleSet::new(),
            force: false,
            preflight: false,
            patches: Vec::new(),
        }
    }
}

/// Result of a successful generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// Render result, with absolute paths pointing into the target
    pub render: RenderResult,
    /// Outputs that replaced files in a pre-existing target
    pub overwritten: Vec<PathBuf>,
    pub commit: CommitOutcome,
    /// Present when the request carried patches
    pub patches: Option<PatchApplySummary>,
}
