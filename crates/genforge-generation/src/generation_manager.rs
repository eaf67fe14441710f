//! Generation manager for orchestrating generation runs
//!
//! A run renders into a private staging directory, commits the finished tree
//! to the target in one relocation, and only then applies patches to the
//! committed files. Any failure before the commit discards the staging tree
//! and leaves the target untouched.

use genforge_common::init_logging;
use genforge_config::{ConfigManager, GenforgeConfig};
use genforge_files::{CommitOptions, StagingManager, StagingTransaction};
use genforge_patch::{PatchEngine, PatchOptions};
use tracing::{info, warn};

use crate::conflict_detector::ConflictDetector;
use crate::error::GenerationError;
use crate::models::{
    ConflictReport, GenerationOutcome, GenerationRequest, PreviewReport, RenderOptions,
    RenderResult,
};
use crate::preview::PreviewPlanner;
use crate::renderer::{PlanItem, TemplateRenderer};

/// Orchestrates preview, staging, commit and patching
#[derive(Debug, Clone)]
pub struct GenerationManager {
    renderer: TemplateRenderer,
    planner: PreviewPlanner,
    conflicts: ConflictDetector,
    staging: StagingManager,
    patches: PatchEngine,
    /// Exclude globs, line endings and sniff size for every run
    render_defaults: RenderOptions,
}

impl GenerationManager {
    /// Creates a manager from explicit collaborators
    pub fn new(
        staging: StagingManager,
        patches: PatchEngine,
        render_defaults: RenderOptions,
    ) -> Self {
        let renderer = TemplateRenderer::new();
        Self {
            planner: PreviewPlanner::new(renderer.clone()),
            renderer,
            conflicts: ConflictDetector::new(),
            staging,
            patches,
            render_defaults,
        }
    }

    /// Creates a manager from loaded configuration
    pub fn from_config(config: &GenforgeConfig) -> Self {
        let render_defaults = RenderOptions {
            exclude: config.render.exclude.clone(),
            line_endings: config.render.line_endings,
            binary_sniff_bytes: config.render.binary_sniff_bytes,
            ..RenderOptions::default()
        };
        let patches = PatchEngine::new(PatchOptions {
            strict: config.patch.strict,
            line_endings: config.patch.line_endings,
        });

        Self::new(
            StagingManager::new(config.staging_config()),
            patches,
            render_defaults,
        )
    }

    /// Loads configuration from the default locations, installs logging at
    /// the configured level (unless a subscriber exists) and builds a manager
    pub fn load() -> Result<Self, GenerationError> {
        let config = ConfigManager::new().load_config()?;
        init_logging(&config.log_options());
        Ok(Self::from_config(&config))
    }

    pub fn staging(&self) -> &StagingManager {
        &self.staging
    }

    pub fn patch_engine(&self) -> &PatchEngine {
        &self.patches
    }

    /// Dry-run classification of the request's outputs against its target
    pub async fn preview(
        &self,
        request: &GenerationRequest,
    ) -> Result<PreviewReport, GenerationError> {
        self.planner
            .preview(
                &request.template_dir,
                &request.target_dir,
                &request.context,
                &request.rename_rules,
                &self.render_defaults,
            )
            .await
    }

    /// Outputs of the request that already exist in its target
    pub fn preflight(&self, request: &GenerationRequest) -> Result<ConflictReport, GenerationError> {
        let plan = self.renderer.plan(
            &request.template_dir,
            &request.target_dir,
            &request.rename_rules,
            &self.render_defaults,
        )?;

        let paths: Vec<_> = plan
            .into_iter()
            .filter_map(|item| match item {
                PlanItem::Output(output) => Some(output.relative),
                PlanItem::Skipped(_) => None,
            })
            .collect();

        self.conflicts.detect(&request.target_dir, &paths)
    }

    /// Run one generation
    ///
    /// With `preflight`, existing outputs abort the run with `OutputConflict`
    /// unless `force` is set. Patch failures are reported per operation in
    /// the outcome and do not fail the run.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        if request.preflight {
            let report = self.preflight(request)?;
            if !request.force {
                self.conflicts.ensure_clear(&report)?;
            }
        }

        let transaction = self.staging.begin().await?;

        let (mut render, overwritten) = match self.stage(&transaction, request).await {
            Ok(staged) => staged,
            Err(e) => {
                self.abort(&transaction).await;
                return Err(e);
            }
        };

        let commit = match self
            .staging
            .commit_transaction(
                transaction.id,
                &request.target_dir,
                CommitOptions {
                    force: request.force,
                },
            )
            .await
        {
            Ok(commit) => commit,
            Err(e) => {
                self.abort(&transaction).await;
                return Err(e.into());
            }
        };

        render.rebase(&transaction.staging_dir, &request.target_dir);

        let patches = if request.patches.is_empty() {
            None
        } else {
            Some(
                self.patches
                    .apply_all(&request.target_dir, &request.patches)
                    .await,
            )
        };

        info!(
            "Generated {} files into {} ({} replaced)",
            render.output_paths().len(),
            request.target_dir.display(),
            overwritten.conflicts.len()
        );

        Ok(GenerationOutcome {
            render,
            overwritten: overwritten.paths(),
            commit,
            patches,
        })
    }

    /// Render into the transaction's staging directory and mark it populated
    ///
    /// With `force`, staged files equivalent to the ones they replace carry
    /// the target's bytes so the commit leaves them as they were.
    async fn stage(
        &self,
        transaction: &StagingTransaction,
        request: &GenerationRequest,
    ) -> Result<(RenderResult, ConflictReport), GenerationError> {
        let options = RenderOptions {
            force: false,
            dry_run: false,
            ..self.render_defaults.clone()
        };

        let mut render = self
            .renderer
            .render(
                &request.template_dir,
                &transaction.staging_dir,
                &request.context,
                &request.rename_rules,
                &options,
            )
            .await?;

        let overwritten = self
            .conflicts
            .detect(&request.target_dir, &render.output_paths())?;

        if request.force && !overwritten.conflicts.is_empty() {
            render.files_unchanged = self
                .renderer
                .keep_equivalent(
                    &render,
                    &transaction.staging_dir,
                    &request.target_dir,
                    options.line_endings,
                )
                .await?;
            let replaced = overwritten.paths();
            render.files_created.retain(|path| !replaced.contains(path));
            render.files_overwritten = replaced;
        }

        self.staging.mark_populated(transaction.id).await?;

        Ok((render, overwritten))
    }

    async fn abort(&self, transaction: &StagingTransaction) {
        if let Err(e) = self.staging.rollback(transaction.id).await {
            warn!(
                "Failed to roll back staging {}: {}",
                transaction.staging_dir.display(),
                e
            );
        }
    }
}
