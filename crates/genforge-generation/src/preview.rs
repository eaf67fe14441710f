//! Dry-run preview
//!
//! Classifies every output of a render as create, modify or noop against the
//! current target without writing anything.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::GenerationError;
use crate::models::{PreviewFile, PreviewOperation, PreviewReport, RenameRuleSet, RenderOptions};
use crate::renderer::{read_existing, PlanItem, TemplateRenderer};

/// Computes what a render would do
#[derive(Debug, Clone, Default)]
pub struct PreviewPlanner {
    renderer: TemplateRenderer,
}

impl PreviewPlanner {
    pub fn new(renderer: TemplateRenderer) -> Self {
        Self { renderer }
    }

    /// Classify every non-excluded output against `target_dir`
    ///
    /// Existing outputs are never an error here; path traversal, a missing
    /// template root and template syntax errors still are.
    pub async fn preview(
        &self,
        template_dir: &Path,
        target_dir: &Path,
        context: &Value,
        rules: &RenameRuleSet,
        options: &RenderOptions,
    ) -> Result<PreviewReport, GenerationError> {
        let plan = self.renderer.plan(template_dir, target_dir, rules, options)?;
        let mut files = Vec::with_capacity(plan.len());

        for item in plan {
            let PlanItem::Output(output) = item else {
                continue;
            };

            let produced = self.renderer.produce(&output, context, options).await?;
            let operation = match read_existing(&output.relative, &output.absolute).await? {
                None => PreviewOperation::Create,
                Some(existing) if produced.matches(&existing, options.line_endings) => {
                    PreviewOperation::Noop
                }
                Some(_) => PreviewOperation::Modify,
            };

            debug!("{:?} {}", operation, output.relative.display());

            files.push(PreviewFile {
                relative_path: output.relative,
                absolute_path: output.absolute,
                operation,
                is_binary: output.entry.is_binary,
                source_template: output.entry.source_relative_path,
            });
        }

        let report = PreviewReport::from_files(files);
        info!(
            "Preview of {}: {} create, {} modify, {} noop",
            target_dir.display(),
            report.counts.create,
            report.counts.modify,
            report.counts.noop
        );
        Ok(report)
    }
}
