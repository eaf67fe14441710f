//! Staged two-phase commit of generated trees
//!
//! A generation run writes everything into a private staging directory. Only
//! when the tree is complete does [`StagingManager::commit`] move it into the
//! real target in one relocation. When an existing target is replaced it is
//! parked in a backup directory first and put back if the relocation fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::FileError;
use crate::models::{
    CommitOptions, CommitOutcome, StagingConfig, StagingTransaction, TransactionStatus,
};
use crate::relocate::{is_cross_device, AtomicRename, CopyThenDelete, Relocator};

const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// Owns the staging and backup roots and the lifecycle of staging transactions
#[derive(Debug, Clone)]
pub struct StagingManager {
    config: StagingConfig,
    transactions: Arc<RwLock<HashMap<Uuid, StagingTransaction>>>,
    primary: Arc<dyn Relocator>,
    fallback: Arc<dyn Relocator>,
}

impl StagingManager {
    /// Creates a manager that renames atomically and copies across devices
    pub fn new(config: StagingConfig) -> Self {
        Self::with_relocators(config, Arc::new(AtomicRename), Arc::new(CopyThenDelete))
    }

    /// Creates a manager with explicit relocation strategies
    ///
    /// `fallback` is only used when `primary` reports a cross-device error.
    pub fn with_relocators(
        config: StagingConfig,
        primary: Arc<dyn Relocator>,
        fallback: Arc<dyn Relocator>,
    ) -> Self {
        StagingManager {
            config,
            transactions: Arc::new(RwLock::new(HashMap::new())),
            primary,
            fallback,
        }
    }

    /// The roots this manager allocates under
    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    /// Allocates a fresh, exclusively owned staging directory
    pub async fn create_staging_dir(&self) -> Result<PathBuf, FileError> {
        let path = allocate_unique_dir(&self.config.staging_root, "run").await?;
        debug!("Allocated staging directory {}", path.display());
        Ok(path)
    }

    /// Begins a staging transaction
    pub async fn begin(&self) -> Result<StagingTransaction, FileError> {
        let staging_dir = self.create_staging_dir().await?;
        let transaction = StagingTransaction {
            id: Uuid::new_v4(),
            staging_dir,
            target_dir: None,
            backup_dir: None,
            status: TransactionStatus::Created,
            created_at: Utc::now(),
            completed_at: None,
        };

        let mut transactions = self.transactions.write().await;
        transactions.insert(transaction.id, transaction.clone());

        Ok(transaction)
    }

    /// Marks a transaction's staging tree as complete
    pub async fn mark_populated(&self, tx_id: Uuid) -> Result<(), FileError> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(&tx_id)
            .ok_or_else(|| FileError::TransactionFailed("Transaction not found".to_string()))?;

        match transaction.status {
            TransactionStatus::Created | TransactionStatus::Populated => {
                transaction.status = TransactionStatus::Populated;
                Ok(())
            }
            status => Err(FileError::TransactionFailed(format!(
                "Cannot populate transaction in state {:?}",
                status
            ))),
        }
    }

    /// Commits a populated transaction into `target_dir`
    ///
    /// On failure the transaction stays `Populated` so the caller can roll it
    /// back.
    pub async fn commit_transaction(
        &self,
        tx_id: Uuid,
        target_dir: &Path,
        options: CommitOptions,
    ) -> Result<CommitOutcome, FileError> {
        let staging_dir = {
            let mut transactions = self.transactions.write().await;
            let transaction = transactions.get_mut(&tx_id).ok_or_else(|| {
                FileError::TransactionFailed("Transaction not found".to_string())
            })?;

            if transaction.status != TransactionStatus::Populated {
                return Err(FileError::TransactionFailed(format!(
                    "Transaction must be populated before commit, found {:?}",
                    transaction.status
                )));
            }

            transaction.target_dir = Some(target_dir.to_path_buf());
            transaction.staging_dir.clone()
        };

        let outcome = self.commit(&staging_dir, target_dir, options).await?;

        let mut transactions = self.transactions.write().await;
        if let Some(transaction) = transactions.get_mut(&tx_id) {
            transaction.status = TransactionStatus::Committed;
            transaction.backup_dir = outcome.retained_backup.clone();
            transaction.completed_at = Some(Utc::now());
        }

        Ok(outcome)
    }

    /// Discards a transaction's staging directory
    pub async fn rollback(&self, tx_id: Uuid) -> Result<(), FileError> {
        let staging_dir = {
            let mut transactions = self.transactions.write().await;
            let transaction = transactions.get_mut(&tx_id).ok_or_else(|| {
                FileError::TransactionFailed("Transaction not found".to_string())
            })?;

            match transaction.status {
                TransactionStatus::Committed => {
                    return Err(FileError::TransactionFailed(
                        "Transaction already committed".to_string(),
                    ))
                }
                TransactionStatus::RolledBack => {
                    return Err(FileError::TransactionFailed(
                        "Transaction already rolled back".to_string(),
                    ))
                }
                TransactionStatus::Created | TransactionStatus::Populated => {}
            }

            transaction.status = TransactionStatus::RolledBack;
            transaction.completed_at = Some(Utc::now());
            transaction.staging_dir.clone()
        };

        self.cleanup(&staging_dir).await;
        Ok(())
    }

    /// Gets the status of a transaction
    pub async fn status(&self, tx_id: Uuid) -> Result<TransactionStatus, FileError> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&tx_id)
            .map(|t| t.status)
            .ok_or_else(|| FileError::TransactionFailed("Transaction not found".to_string()))
    }

    /// Gets a snapshot of a transaction
    pub async fn transaction(&self, tx_id: Uuid) -> Result<StagingTransaction, FileError> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&tx_id)
            .cloned()
            .ok_or_else(|| FileError::TransactionFailed("Transaction not found".to_string()))
    }

    /// Relocates `staging_dir` to `target_dir`
    ///
    /// The target is left either fully replaced or in its pre-commit state.
    /// A failed commit leaves the staging directory for the caller to clean up.
    pub async fn commit(
        &self,
        staging_dir: &Path,
        target_dir: &Path,
        options: CommitOptions,
    ) -> Result<CommitOutcome, FileError> {
        if !path_exists(staging_dir).await {
            return Err(FileError::StagingFailed(format!(
                "Staging directory {} does not exist",
                staging_dir.display()
            )));
        }

        let target_exists = path_exists(target_dir).await;
        if target_exists && !options.force {
            return Err(FileError::TargetExists(target_dir.to_path_buf()));
        }

        if let Some(parent) = target_dir.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let backup_dir = if target_exists {
            let backup = self.allocate_backup_path(target_dir).await.map_err(|source| {
                FileError::CommitBackupFailed {
                    target: target_dir.to_path_buf(),
                    source,
                }
            })?;

            self.relocate(target_dir, &backup)
                .await
                .map_err(|source| FileError::CommitBackupFailed {
                    target: target_dir.to_path_buf(),
                    source,
                })?;

            debug!(
                "Moved existing target {} to backup {}",
                target_dir.display(),
                backup.display()
            );
            Some(backup)
        } else {
            None
        };

        match self.relocate(staging_dir, target_dir).await {
            Ok(used_fallback_copy) => {
                let retained_backup = match &backup_dir {
                    Some(backup) => remove_backup(backup).await,
                    None => None,
                };

                info!(
                    "Committed {} to {}{}",
                    staging_dir.display(),
                    target_dir.display(),
                    if used_fallback_copy { " (copy fallback)" } else { "" }
                );

                Ok(CommitOutcome {
                    target_dir: target_dir.to_path_buf(),
                    used_fallback_copy,
                    replaced_existing: backup_dir.is_some(),
                    retained_backup,
                })
            }
            Err(err) => {
                warn!(
                    "Relocating {} to {} failed: {}",
                    staging_dir.display(),
                    target_dir.display(),
                    err
                );
                let restored = self.restore_target(target_dir, backup_dir.as_deref()).await;

                Err(FileError::CommitFailed {
                    target: target_dir.to_path_buf(),
                    reason: err.to_string(),
                    restored,
                })
            }
        }
    }

    /// Removes a staging directory; never fails
    pub async fn cleanup(&self, staging_dir: &Path) {
        match fs::remove_dir_all(staging_dir).await {
            Ok(()) => debug!("Removed staging directory {}", staging_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove staging directory {}: {}",
                staging_dir.display(),
                e
            ),
        }
    }

    /// Removes the entire staging root; never fails
    pub async fn cleanup_all_staging(&self) {
        match fs::remove_dir_all(&self.config.staging_root).await {
            Ok(()) => info!(
                "Removed staging root {}",
                self.config.staging_root.display()
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove staging root {}: {}",
                self.config.staging_root.display(),
                e
            ),
        }
    }

    /// Forgets committed and rolled-back transactions finished at least
    /// `max_age` ago. Returns the number of entries dropped.
    pub async fn prune_finished(&self, max_age: Duration) -> usize {
        let Ok(limit) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let now = Utc::now();

        let mut transactions = self.transactions.write().await;
        let before = transactions.len();
        transactions.retain(|_, t| match (t.status, t.completed_at) {
            (TransactionStatus::Committed | TransactionStatus::RolledBack, Some(done)) => {
                now - done < limit
            }
            _ => true,
        });

        let pruned = before - transactions.len();
        if pruned > 0 {
            debug!("Pruned {} finished transactions", pruned);
        }
        pruned
    }

    /// Removes staging directories older than `max_age`
    ///
    /// Directories owned by open transactions of this manager are kept, and
    /// finished transactions older than `max_age` are forgotten.
    /// Returns the number of directories removed.
    pub async fn cleanup_stale(&self, max_age: Duration) -> usize {
        self.prune_finished(max_age).await;

        let active: Vec<PathBuf> = {
            let transactions = self.transactions.read().await;
            transactions
                .values()
                .filter(|t| {
                    matches!(
                        t.status,
                        TransactionStatus::Created | TransactionStatus::Populated
                    )
                })
                .map(|t| t.staging_dir.clone())
                .collect()
        };

        let mut entries = match fs::read_dir(&self.config.staging_root).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if active.contains(&path) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age >= max_age && fs::remove_dir_all(&path).await.is_ok() {
                debug!("Removed stale staging directory {}", path.display());
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Removed {} stale staging directories", removed);
        }
        removed
    }

    /// Moves `src` to `dest`, falling back to copying across devices
    ///
    /// Returns whether the fallback was used.
    async fn relocate(&self, src: &Path, dest: &Path) -> std::io::Result<bool> {
        match self.primary.relocate(src, dest).await {
            Ok(()) => Ok(false),
            Err(e) if is_cross_device(&e) => {
                debug!(
                    "{} crossed devices for {}, using {}",
                    self.primary.name(),
                    src.display(),
                    self.fallback.name()
                );
                self.fallback.relocate(src, dest).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Puts the target back into its pre-commit state after a failed relocation
    ///
    /// Returns whether a backup was restored.
    async fn restore_target(&self, target_dir: &Path, backup_dir: Option<&Path>) -> bool {
        // A copy fallback may have left a partial tree behind
        if let Ok(metadata) = fs::symlink_metadata(target_dir).await {
            let removal = if metadata.is_dir() {
                fs::remove_dir_all(target_dir).await
            } else {
                fs::remove_file(target_dir).await
            };
            if let Err(e) = removal {
                error!(
                    "Failed to clear partial target {}: {}",
                    target_dir.display(),
                    e
                );
            }
        }

        let Some(backup_dir) = backup_dir else {
            return false;
        };

        match self.relocate(backup_dir, target_dir).await {
            Ok(_) => {
                warn!(
                    "Restored {} from backup {}",
                    target_dir.display(),
                    backup_dir.display()
                );
                true
            }
            Err(e) => {
                error!(
                    "Failed to restore {} from backup {}: {}",
                    target_dir.display(),
                    backup_dir.display(),
                    e
                );
                false
            }
        }
    }

    /// Reserves a backup path for `target_dir`; the path itself is not created
    async fn allocate_backup_path(&self, target_dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.config.backup_root).await?;

        let base = target_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("target");

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let candidate = self.config.backup_root.join(unique_name(base));
            if !path_exists(&candidate).await {
                return Ok(candidate);
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "could not allocate a unique backup path",
        ))
    }
}

impl Default for StagingManager {
    fn default() -> Self {
        Self::new(StagingConfig::default())
    }
}

/// `<prefix>-<UTC timestamp>-<random suffix>`
fn unique_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%dT%H%M%S%6fZ"),
        &suffix[..12]
    )
}

async fn allocate_unique_dir(root: &Path, prefix: &str) -> Result<PathBuf, FileError> {
    fs::create_dir_all(root).await.map_err(|e| {
        FileError::StagingFailed(format!(
            "Failed to create staging root {}: {}",
            root.display(),
            e
        ))
    })?;

    for _ in 0..MAX_ALLOCATION_ATTEMPTS {
        let candidate = root.join(unique_name(prefix));
        // create_dir (not create_dir_all) fails if another run got there first
        match fs::create_dir(&candidate).await {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(FileError::StagingFailed(format!(
                    "Failed to create {}: {}",
                    candidate.display(),
                    e
                )))
            }
        }
    }

    Err(FileError::StagingFailed(
        "Could not allocate a unique staging directory".to_string(),
    ))
}

async fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Returns the backup path when it could not be removed
async fn remove_backup(backup: &Path) -> Option<PathBuf> {
    match fs::remove_dir_all(backup).await {
        Ok(()) => None,
        Err(e) => {
            warn!("Failed to remove backup {}: {}", backup.display(), e);
            Some(backup.to_path_buf())
        }
    }
}
