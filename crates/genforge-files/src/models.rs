//! Data models for staging and writing

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Locations owned by a [`crate::StagingManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory under which per-run staging directories are allocated
    pub staging_root: PathBuf,
    /// Directory under which displaced targets are parked during commit
    pub backup_root: PathBuf,
}

impl StagingConfig {
    /// Build a config with `staging/` and `backups/` under one base directory
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            staging_root: base.join("staging"),
            backup_root: base.join("backups"),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self::under(std::env::temp_dir().join("genforge"))
    }
}

/// Lifecycle of a staging transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Staging directory allocated, nothing written yet
    Created,
    /// Caller has finished materializing files into staging
    Populated,
    /// Staging was relocated into the target
    Committed,
    /// Staging was discarded
    RolledBack,
}

/// One generation run's ownership of a staging directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingTransaction {
    /// Unique identifier for the transaction
    pub id: Uuid,
    /// Exclusively owned staging directory
    pub staging_dir: PathBuf,
    /// Target the staging tree was (or is being) committed to
    pub target_dir: Option<PathBuf>,
    /// Backup left behind when its removal after commit failed
    pub backup_dir: Option<PathBuf>,
    /// Current status of the transaction
    pub status: TransactionStatus,
    /// When the transaction was created
    pub created_at: DateTime<Utc>,
    /// When the transaction was committed or rolled back
    pub completed_at: Option<DateTime<Utc>>,
}

/// Options for a commit
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CommitOptions {
    /// Replace an existing target (it is backed up and restored on failure)
    pub force: bool,
}

impl CommitOptions {
    /// Options that allow replacing an existing target
    pub fn force() -> Self {
        Self { force: true }
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// Directory that now holds the committed tree
    pub target_dir: PathBuf,
    /// The atomic rename crossed devices and the copy fallback was used
    pub used_fallback_copy: bool,
    /// An existing target was replaced
    pub replaced_existing: bool,
    /// Backup that could not be removed after the commit
    pub retained_backup: Option<PathBuf>,
}

/// Record of one atomic file write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRecord {
    /// Path that was written
    pub path: PathBuf,
    /// The file did not exist before the write
    pub created: bool,
    /// Number of bytes written
    pub bytes_written: usize,
}
