//! Output path computation
//!
//! Applies rename rules to a template-relative path and checks that the result
//! stays inside the output root.

use std::path::{Path, PathBuf};

use genforge_files::paths::normalize_relative;
use genforge_files::to_slash_string;

use crate::error::GenerationError;
use crate::models::RenameRuleSet;

/// Rewrites template paths into destination paths
#[derive(Debug, Clone, Default)]
pub struct PathRewriter {
    rules: Vec<(String, String)>,
}

impl PathRewriter {
    pub fn new(rules: &RenameRuleSet) -> Self {
        Self {
            rules: rules
                .ordered()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Substitute every rule key in `path`, longest keys first
    pub fn rewrite(&self, path: &str) -> String {
        self.rules
            .iter()
            .fold(path.to_string(), |acc, (key, value)| acc.replace(key.as_str(), value))
    }

    /// Compute `(relative, absolute)` destinations for a template file
    ///
    /// Fails with `PathTraversal` when the rewritten path is absolute, climbs
    /// above `target_root`, or resolves to the root itself.
    pub fn destination(
        &self,
        source_relative: &Path,
        target_root: &Path,
    ) -> Result<(PathBuf, PathBuf), GenerationError> {
        let rewritten = self.rewrite(&to_slash_string(source_relative));

        match normalize_relative(Path::new(&rewritten)) {
            Some(relative) => {
                let absolute = target_root.join(&relative);
                Ok((relative, absolute))
            }
            None => Err(GenerationError::PathTraversal {
                source_path: source_relative.to_path_buf(),
                destination: rewritten,
                target_root: target_root.to_path_buf(),
            }),
        }
    }
}
