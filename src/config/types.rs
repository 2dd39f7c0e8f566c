use crate::jobs::{Destination, NewJob, Schedule, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub jobs: BTreeMap<String, JobConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Local scratch directory where artifacts are built before transfer
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// SQLite database holding job definitions and run status
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Symmetric key file (created with owner-only permissions)
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,

    /// Directory for per-job lock files
    #[serde(default = "default_lock_directory")]
    pub lock_directory: PathBuf,

    /// Scheduler polling interval
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// External tools
    #[serde(default = "default_dump_tool")]
    pub dump_tool: String,
    #[serde(default = "default_smb_client")]
    pub smb_client: String,

    /// Timeout settings
    #[serde(default = "default_timeout")]
    pub dump_timeout_seconds: u64,
    #[serde(default = "default_timeout")]
    pub transfer_timeout_seconds: u64,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            database_path: default_database_path(),
            key_file: default_key_file(),
            lock_directory: default_lock_directory(),
            tick_seconds: default_tick_seconds(),
            dump_tool: default_dump_tool(),
            smb_client: default_smb_client(),
            dump_timeout_seconds: default_timeout(),
            transfer_timeout_seconds: default_timeout(),
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// S3-compatible object store settings.
/// Every field can be overridden by a `BACKUP_S3_*` environment variable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    #[serde(default = "default_s3_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_s3_endpoint(),
            region: default_s3_region(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Job definition (keyed by job name in the `[jobs]` table)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    /// Owning client; job names are unique per client
    #[serde(default = "default_client_id")]
    pub client_id: String,

    pub source_kind: SourceKind,

    /// Filesystem path or database connection descriptor
    pub source_path: String,

    pub destination: Destination,

    /// Cron schedule; omitted means manual-only
    #[serde(default)]
    pub schedule: Option<Schedule>,

    /// Days to keep artifacts at the destination (0 disables pruning)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_true")]
    pub compress: bool,
    #[serde(default = "default_true")]
    pub encrypt: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl JobConfig {
    pub fn to_new_job(&self, name: &str) -> NewJob {
        NewJob {
            name: name.to_string(),
            client_id: self.client_id.clone(),
            source_kind: self.source_kind,
            source_path: self.source_path.clone(),
            destination: self.destination.clone(),
            schedule: self.schedule.clone(),
            retention_days: self.retention_days,
            compress: self.compress,
            encrypt: self.encrypt,
            active: self.active,
        }
    }
}

// Default value functions

fn default_scratch_dir() -> PathBuf { std::env::temp_dir().join("backup-orchestrator") }
fn default_database_path() -> PathBuf { PathBuf::from("~/.local/share/backup-orchestrator/jobs.db") }
fn default_key_file() -> PathBuf { PathBuf::from("~/.config/backup-orchestrator/.backup_key") }
fn default_lock_directory() -> PathBuf { std::env::temp_dir() }
fn default_tick_seconds() -> u64 { 60 }
fn default_dump_tool() -> String { "mysqldump".to_string() }
fn default_smb_client() -> String { "smbclient".to_string() }
fn default_timeout() -> u64 { 3600 }
fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_s3_endpoint() -> String { "https://s3.wasabisys.com".to_string() }
fn default_s3_region() -> String { "us-east-1".to_string() }
fn default_key_prefix() -> String { "backups".to_string() }
fn default_client_id() -> String { "default".to_string() }
fn default_retention_days() -> u32 { 30 }
fn default_true() -> bool { true }
