//! File-based locking to prevent concurrent runs of the same job
//!
//! The lock is an advisory `flock`-style lock, so it is honoured across
//! threads and processes and released by the OS if the holder crashes.

use crate::error::{BackupError, Result};
use crate::jobs::JobId;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file for one job. Acquire with [`JobLock::try_acquire`]; the lock is
/// held for as long as the returned guard lives.
pub struct JobLock {
    lock: RwLock<File>,
    job_id: JobId,
    lock_path: PathBuf,
}

impl JobLock {
    /// Open (or create) the lock file for `job_id` inside `lock_dir`
    pub fn open(lock_dir: &Path, job_id: JobId) -> Result<Self> {
        std::fs::create_dir_all(lock_dir)?;

        let lock_path = Self::lock_path(lock_dir, job_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        Ok(Self {
            lock: RwLock::new(file),
            job_id,
            lock_path,
        })
    }

    /// Take the exclusive lock without blocking.
    ///
    /// Fails with [`BackupError::AlreadyRunning`] when another holder exists.
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        debug!("Attempting to acquire lock: {:?}", self.lock_path);

        match self.lock.try_write() {
            Ok(guard) => {
                debug!("Acquired lock for job {}", self.job_id);
                Ok(guard)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(BackupError::AlreadyRunning(self.job_id)),
            Err(e) => Err(BackupError::Io(e)),
        }
    }

    /// Lock file path for a job
    pub fn lock_path(lock_dir: &Path, job_id: JobId) -> PathBuf {
        lock_dir.join(format!("backup-orchestrator-job-{}.lock", job_id))
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}
