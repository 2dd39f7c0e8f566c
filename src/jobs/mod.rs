//! Backup job and run definitions

mod schedule;

pub use schedule::{CronExpression, Schedule, ScheduleError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque job identifier (row id in the job store)
pub type JobId = i64;

/// What kind of source a job backs up
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Directory,
    Database,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Directory => "directory",
            SourceKind::Database => "database",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(SourceKind::File),
            "directory" => Some(SourceKind::Directory),
            "database" => Some(SourceKind::Database),
            _ => None,
        }
    }
}

/// Connection details for FTP and SMB destinations
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Directory on the server. For SMB the first segment is the share name.
    #[serde(default)]
    pub remote_path: String,
}

impl RemoteEndpoint {
    pub fn port_or(&self, default_port: u16) -> u16 {
        self.port.unwrap_or(default_port)
    }

    /// Non-empty path segments of `remote_path`
    pub fn path_segments(&self) -> Vec<&str> {
        self.remote_path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Where a job's artifact is sent
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    Local {
        path: PathBuf,
    },
    Ftp(RemoteEndpoint),
    Smb(RemoteEndpoint),
    ObjectStore {
        /// Falls back to the configured default bucket
        #[serde(default)]
        bucket: Option<String>,
        /// Key prefix, `backups` when unset
        #[serde(default)]
        prefix: Option<String>,
    },
}

impl Destination {
    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::Local { .. } => DestinationKind::Local,
            Destination::Ftp(_) => DestinationKind::Ftp,
            Destination::Smb(_) => DestinationKind::Smb,
            Destination::ObjectStore { .. } => DestinationKind::ObjectStore,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Destination::Local { .. })
    }

    /// Short human-readable location, without credentials
    pub fn describe(&self) -> String {
        match self {
            Destination::Local { path } => format!("local:{}", path.display()),
            Destination::Ftp(e) => format!("ftp://{}:{}/{}", e.host, e.port_or(21), e.remote_path),
            Destination::Smb(e) => format!("smb://{}:{}/{}", e.host, e.port_or(445), e.remote_path),
            Destination::ObjectStore { bucket, prefix } => format!(
                "s3://{}/{}",
                bucket.as_deref().unwrap_or("<default>"),
                prefix.as_deref().unwrap_or("backups")
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Local,
    Ftp,
    Smb,
    ObjectStore,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DestinationKind::Local => "local",
            DestinationKind::Ftp => "ftp",
            DestinationKind::Smb => "smb",
            DestinationKind::ObjectStore => "object_store",
        };
        f.write_str(name)
    }
}

/// Job definition as written by an operator, before it gets an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub name: String,
    pub client_id: String,
    pub source_kind: SourceKind,
    pub source_path: String,
    pub destination: Destination,
    pub schedule: Option<Schedule>,
    pub retention_days: u32,
    pub compress: bool,
    pub encrypt: bool,
    pub active: bool,
}

/// A persisted backup job together with its last-run slot
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub id: JobId,
    pub name: String,
    pub client_id: String,
    pub source_kind: SourceKind,
    pub source_path: String,
    pub destination: Destination,
    pub schedule: Option<Schedule>,
    pub retention_days: u32,
    pub compress: bool,
    pub encrypt: bool,
    pub active: bool,
    pub last_run: Option<BackupRun>,
}

impl BackupJob {
    pub fn is_running(&self) -> bool {
        self.last_run
            .as_ref()
            .map(|run| run.status == RunStatus::Running)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRun {
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub message: Option<String>,
    pub artifact_size_bytes: Option<u64>,
}

impl BackupRun {
    pub fn start(job_id: JobId) -> Self {
        Self {
            job_id,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            message: None,
            artifact_size_bytes: None,
        }
    }

    pub fn succeed(mut self, artifact_size_bytes: u64) -> Self {
        self.finished_at = Some(Utc::now());
        self.status = RunStatus::Success;
        self.message = Some(format!("backup completed - {} bytes", artifact_size_bytes));
        self.artifact_size_bytes = Some(artifact_size_bytes);
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.finished_at = Some(Utc::now());
        self.status = RunStatus::Error;
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
