//! Path containment checks
//!
//! Every destination genforge computes is relative to some root (a staging
//! directory, a target directory). These helpers normalize such a path
//! lexically and refuse anything that would land outside the root.

use std::path::{Component, Path, PathBuf};

use crate::error::FileError;

/// Lexically normalize a relative path.
///
/// Returns `None` when the path is absolute, climbs above its starting point,
/// or normalizes to nothing.
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return None,
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part),
        }
    }

    if parts.is_empty() {
        return None;
    }

    Some(parts.iter().collect())
}

/// Resolve `relative` against `root`, failing if it would escape.
pub fn resolve_within(root: &Path, relative: &Path) -> Result<PathBuf, FileError> {
    normalize_relative(relative)
        .map(|normalized| root.join(normalized))
        .ok_or_else(|| FileError::PathEscape {
            path: relative.to_path_buf(),
            root: root.to_path_buf(),
        })
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash_string(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
