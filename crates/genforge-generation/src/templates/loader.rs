//! Template tree discovery

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::binary::BinaryClassifier;
use crate::error::GenerationError;
use crate::models::TemplateEntry;

/// Enumerates the regular files of a template tree
#[derive(Debug, Clone, Default)]
pub struct TemplateLoader {
    classifier: BinaryClassifier,
}

impl TemplateLoader {
    pub fn new(classifier: BinaryClassifier) -> Self {
        Self { classifier }
    }

    /// Discover every regular file under `template_dir`, sorted by file name
    ///
    /// Symlinks and special files are ignored.
    pub fn discover(&self, template_dir: &Path) -> Result<Vec<TemplateEntry>, GenerationError> {
        if !template_dir.is_dir() {
            return Err(GenerationError::TemplateDirNotFound(
                template_dir.to_path_buf(),
            ));
        }

        let mut entries = Vec::new();

        for entry in WalkDir::new(template_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                GenerationError::IoError(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "template walk failed")
                }))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let source_path = entry.path().to_path_buf();
            let source_relative_path = match source_path.strip_prefix(template_dir) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };

            let metadata = entry.metadata().map_err(|e| {
                GenerationError::IoError(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "template metadata failed")
                }))
            })?;

            entries.push(TemplateEntry {
                is_binary: self.classifier.is_binary_file(&source_path)?,
                permission_mode: permission_mode(&metadata),
                source_relative_path,
                source_path,
            });
        }

        debug!(
            "Discovered {} template files in {}",
            entries.len(),
            template_dir.display()
        );
        Ok(entries)
    }
}

#[cfg(unix)]
fn permission_mode(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn permission_mode(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}
