//! Host-wide repository lock.
//!
//! One exclusive `flock` on a well-known file serializes every
//! repository-wide sequence (mirror refresh, checkouts, cleanup, gc) across
//! agent jobs and concurrent CLI invocations. Blocking; released on drop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{io_err, SyncError};

#[derive(Debug)]
pub struct RepositoryLock {
    file: File,
    path: PathBuf,
}

impl RepositoryLock {
    /// Block until the lock at `path` is held. Creates the file if absent.
    pub fn acquire(path: &Path) -> Result<Self, SyncError> {
        let file = open_lock_file(path)?;
        tracing::debug!("waiting for repository lock {}", path.display());
        file.lock_exclusive().map_err(|source| SyncError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("acquired repository lock {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take the lock only if nobody holds it.
    #[cfg(test)]
    pub(crate) fn try_acquire(path: &Path) -> Result<Option<Self>, SyncError> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(err) if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(source) => Err(SyncError::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release lock {}: {err}", self.path.display());
        }
    }
}

/// Run `f` while holding the repository lock.
pub fn with_repository_lock<T>(
    path: &Path,
    f: impl FnOnce() -> Result<T, SyncError>,
) -> Result<T, SyncError> {
    let _lock = RepositoryLock::acquire(path)?;
    f()
}

fn open_lock_file(path: &Path) -> Result<File, SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| io_err(path, e))
}
