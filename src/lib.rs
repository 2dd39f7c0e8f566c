//! Backup Orchestrator Library
//!
//! Runs backup jobs (files, directories, databases) into tar artifacts,
//! optionally encrypts them and ships them to local, FTP, SMB or S3-compatible
//! destinations on a schedule.

pub mod archive;
pub mod config;
pub mod crypto;
pub mod destinations;
pub mod error;
pub mod jobs;
pub mod managers;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, sync_jobs, Config};
pub use error::BackupError;
pub use managers::backup::BackupExecutor;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::scheduler::{JobRunner, Scheduler};
pub use store::{JobStore, SqliteJobStore};
