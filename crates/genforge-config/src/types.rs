//! Core configuration types and data structures

use std::path::PathBuf;

use genforge_common::LogOptions;
use genforge_files::{LineEndingPolicy, StagingConfig};
use serde::{Deserialize, Serialize};

/// Bytes inspected when deciding whether a template file is binary
pub const DEFAULT_BINARY_SNIFF_BYTES: usize = 8192;

/// Main genforge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenforgeConfig {
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Staging and backup locations
    pub staging: StagingSettings,
    /// Template rendering defaults
    pub render: RenderSettings,
    /// Patch engine defaults
    pub patch: PatchSettings,
}

/// Where staging and backup directories are allocated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StagingSettings {
    /// Root for per-run staging directories
    pub staging_root: PathBuf,
    /// Root for displaced targets during a forced commit
    pub backup_root: PathBuf,
}

/// Rendering defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    /// Leading bytes scanned for a NUL byte
    pub binary_sniff_bytes: usize,
    /// Globs (relative to the template root) that are never rendered
    pub exclude: Vec<String>,
    /// Line-ending policy for rendered text
    pub line_endings: LineEndingPolicy,
}

/// Patch engine defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatchSettings {
    /// Missing markers and files are errors rather than skips
    pub strict: bool,
    /// Line-ending policy applied after patching
    pub line_endings: LineEndingPolicy,
}

impl GenforgeConfig {
    /// Logging options for `init_logging`; `RUST_LOG` still takes precedence
    pub fn log_options(&self) -> LogOptions {
        LogOptions::with_level(self.log_level.as_str())
    }

    /// The staging manager configuration these settings describe
    pub fn staging_config(&self) -> StagingConfig {
        StagingConfig {
            staging_root: self.staging.staging_root.clone(),
            backup_root: self.staging.backup_root.clone(),
        }
    }
}

impl Default for GenforgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            staging: StagingSettings::default(),
            render: RenderSettings::default(),
            patch: PatchSettings::default(),
        }
    }
}

impl Default for StagingSettings {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("genforge");
        let defaults = StagingConfig::under(base);
        Self {
            staging_root: defaults.staging_root,
            backup_root: defaults.backup_root,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            binary_sniff_bytes: DEFAULT_BINARY_SNIFF_BYTES,
            exclude: Vec::new(),
            line_endings: LineEndingPolicy::Preserve,
        }
    }
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            strict: true,
            line_endings: LineEndingPolicy::Preserve,
        }
    }
}
