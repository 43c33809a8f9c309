//! Writer lock
//!
//! Publishers serialize on an exclusive advisory lock over `_F.lock`. The
//! file is opened once with create-if-absent semantics, so concurrent first
//! publishers never race on its creation, then locked with a blocking
//! `fs2` exclusive lock. Dropping the guard releases the lock.

use crate::error::LdataError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Held exclusive lock on a lock file.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Open (creating if absent) and exclusively lock `path`, blocking until
    /// the lock is granted.
    pub fn acquire(path: &Path) -> Result<Self, LdataError> {
        let lock_err = |source: std::io::Error| LdataError::Lock {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;
        trace!(target: "ldata::lock", path = %path.display(), "Lock acquired");
        Ok(LockGuard {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Try to lock without blocking. `Ok(None)` if another holder has it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LdataError> {
        let lock_err = |source: std::io::Error| LdataError::Lock {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(lock_err)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockGuard {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(lock_err(e)),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(target: "ldata::lock", path = %self.path.display(), error = %e, "Unlock failed");
        } else {
            trace!(target: "ldata::lock", path = %self.path.display(), "Lock released");
        }
    }
}
