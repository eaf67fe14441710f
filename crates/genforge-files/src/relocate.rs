//! Directory relocation strategies
//!
//! A commit moves a whole tree from one place to another. Where source and
//! destination share a filesystem that is a single rename; across devices the
//! rename fails and the tree has to be copied and the source removed.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

/// Moves a file or directory tree from `src` to `dest`.
///
/// `dest` must not exist beforehand.
#[async_trait]
pub trait Relocator: Send + Sync + Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Move `src` to `dest`
    async fn relocate(&self, src: &Path, dest: &Path) -> std::io::Result<()>;
}

/// Single rename syscall
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicRename;

#[async_trait]
impl Relocator for AtomicRename {
    fn name(&self) -> &'static str {
        "atomic-rename"
    }

    async fn relocate(&self, src: &Path, dest: &Path) -> std::io::Result<()> {
        fs::rename(src, dest).await
    }
}

/// Recursive copy followed by removal of the source
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyThenDelete;

#[async_trait]
impl Relocator for CopyThenDelete {
    fn name(&self) -> &'static str {
        "copy-then-delete"
    }

    async fn relocate(&self, src: &Path, dest: &Path) -> std::io::Result<()> {
        let metadata = fs::symlink_metadata(src).await?;

        if metadata.is_dir() {
            copy_dir_recursive(src, dest).await?;
            // The copy is complete at this point; a leftover source is only litter
            if let Err(e) = fs::remove_dir_all(src).await {
                warn!("Copied {} but could not remove it: {}", src.display(), e);
            }
        } else {
            fs::copy(src, dest).await?;
            if let Err(e) = fs::remove_file(src).await {
                warn!("Copied {} but could not remove it: {}", src.display(), e);
            }
        }

        Ok(())
    }
}

/// Whether `err` is the platform's "rename across filesystems" error.
pub fn is_cross_device(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::libc::EXDEV)
    }

    #[cfg(windows)]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// Copy the tree at `src` into a new directory `dest`.
///
/// File permissions are carried over; symlinks are recreated on Unix.
pub async fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dest.to_path_buf())];

    while let Some((from_dir, to_dir)) = pending.pop() {
        fs::create_dir_all(&to_dir).await?;
        let permissions = fs::metadata(&from_dir).await?.permissions();

        let mut entries = fs::read_dir(&from_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let from = entry.path();
            let to = to_dir.join(entry.file_name());
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                pending.push((from, to));
            } else if file_type.is_symlink() {
                copy_symlink(&from, &to).await?;
            } else {
                fs::copy(&from, &to).await?;
            }
        }

        fs::set_permissions(&to_dir, permissions).await?;
    }

    debug!("Copied tree {} -> {}", src.display(), dest.display());
    Ok(())
}

#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    let target = fs::read_link(from).await?;
    fs::symlink(target, to).await
}

#[cfg(not(unix))]
async fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to).await.map(|_| ())
}
