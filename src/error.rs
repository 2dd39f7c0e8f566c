//! Error taxonomy for backup runs

use crate::jobs::JobId;
use std::path::PathBuf;

/// Errors raised while building, encrypting, transferring or recording a backup
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("source not found: {0:?}")]
    SourceNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported connection string (expected host:port:database:user:password): {0}")]
    UnsupportedConnectionString(String),

    #[error("dump tool failed: {0}")]
    DumpTool(String),

    #[error("encryption key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("retention prune failed: {0}")]
    RetentionPrune(String),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("job {0} is inactive")]
    JobInactive(JobId),

    #[error("job {0} is already running")]
    AlreadyRunning(JobId),

    #[error("job store error: {0}")]
    Store(String),
}

impl From<rusqlite::Error> for BackupError {
    fn from(err: rusqlite::Error) -> Self {
        BackupError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
