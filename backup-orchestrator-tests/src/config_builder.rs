//! Fluent API for building test configurations
//!
//! Every path the orchestrator writes to (scratch, database, key, locks, logs,
//! local backups) lands inside one temporary directory.

use backup_orchestrator::config::{Config, GlobalConfig, JobConfig, ObjectStoreConfig};
use backup_orchestrator::jobs::{Destination, RemoteEndpoint, Schedule, SourceKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name of the persisted configuration inside the temp dir
pub const CONFIG_FILE: &str = "config.toml";

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    object_store: ObjectStoreConfig,
    jobs: BTreeMap<String, JobConfig>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with every directory inside a fresh temp dir
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        for dir in ["scratch", "logs", "locks", "backups"] {
            fs::create_dir_all(root.join(dir)).expect("Failed to create test directory");
        }

        let global = GlobalConfig {
            scratch_dir: root.join("scratch"),
            database_path: root.join("jobs.db"),
            key_file: root.join("keys").join("backup.key"),
            lock_directory: root.join("locks"),
            log_directory: root.join("logs"),
            tick_seconds: 1,
            dump_timeout_seconds: 60,
            transfer_timeout_seconds: 60,
            log_level: "debug".to_string(),
            log_max_files: 5,
            ..GlobalConfig::default()
        };

        Self {
            temp_dir,
            global,
            object_store: ObjectStoreConfig::default(),
            jobs: BTreeMap::new(),
        }
    }

    /// A config with one directory job backing up `<temp>/source`
    pub fn minimal() -> Self {
        let builder = Self::new();
        let source = builder.temp_dir().join("source");
        fs::create_dir_all(&source).expect("Failed to create source dir");
        fs::write(source.join("readme.txt"), "backup me").expect("Failed to write source file");

        builder.add_directory_job("site", &source)
    }

    /// Set the dump tool program
    pub fn with_dump_tool(mut self, program: &str) -> Self {
        self.global.dump_tool = program.to_string();
        self
    }

    /// Set the SMB client program
    pub fn with_smb_client(mut self, program: &str) -> Self {
        self.global.smb_client = program.to_string();
        self
    }

    /// Set the key file path
    pub fn with_key_file(mut self, path: &Path) -> Self {
        self.global.key_file = path.to_path_buf();
        self
    }

    /// Set both dump and transfer timeouts
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.global.dump_timeout_seconds = seconds;
        self.global.transfer_timeout_seconds = seconds;
        self
    }

    pub fn with_object_store(mut self, object_store: ObjectStoreConfig) -> Self {
        self.object_store = object_store;
        self
    }

    /// Add a directory job with a local destination under `<temp>/backups`
    pub fn add_directory_job(self, name: &str, source: &Path) -> Self {
        let job = self.local_job(SourceKind::Directory, &source.display().to_string());
        self.add_job(name, job)
    }

    /// Add a single-file job with a local destination
    pub fn add_file_job(self, name: &str, source: &Path) -> Self {
        let job = self.local_job(SourceKind::File, &source.display().to_string());
        self.add_job(name, job)
    }

    /// Add an embedded-database job with a local destination
    pub fn add_sqlite_job(self, name: &str, db_path: &Path) -> Self {
        let job = self.local_job(SourceKind::Database, &db_path.display().to_string());
        self.add_job(name, job)
    }

    /// Add a server database job (`host:port:database:user:password`)
    pub fn add_server_database_job(self, name: &str, connection: &str) -> Self {
        let job = self.local_job(SourceKind::Database, connection);
        self.add_job(name, job)
    }

    /// Add a directory job with a cron schedule
    pub fn add_scheduled_job(self, name: &str, source: &Path, schedule: &str) -> Self {
        let mut job = self.local_job(SourceKind::Directory, &source.display().to_string());
        job.schedule = Some(Schedule::parse(schedule).expect("Invalid test schedule"));
        self.add_job(name, job)
    }

    /// Add an inactive directory job
    pub fn add_inactive_job(self, name: &str, source: &Path) -> Self {
        let mut job = self.local_job(SourceKind::Directory, &source.display().to_string());
        job.active = false;
        self.add_job(name, job)
    }

    /// Add an FTP job (host/user are placeholders unless overridden)
    pub fn add_ftp_job(self, name: &str, source: &Path, endpoint: RemoteEndpoint) -> Self {
        let mut job = self.local_job(SourceKind::Directory, &source.display().to_string());
        job.destination = Destination::Ftp(endpoint);
        self.add_job(name, job)
    }

    /// Add a job with full configuration
    pub fn add_job(mut self, name: &str, job: JobConfig) -> Self {
        self.jobs.insert(name.to_string(), job);
        self
    }

    /// Default job definition: compressed, encrypted, local, 30 days retention
    pub fn local_job(&self, source_kind: SourceKind, source_path: &str) -> JobConfig {
        JobConfig {
            client_id: "test-client".to_string(),
            source_kind,
            source_path: source_path.to_string(),
            destination: Destination::Local {
                path: self.backup_dir(),
            },
            schedule: None,
            retention_days: 30,
            compress: true,
            encrypt: true,
            active: true,
        }
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Local destination directory shared by the builder's jobs
    pub fn backup_dir(&self) -> PathBuf {
        self.temp_dir.path().join("backups")
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// Build the Config (the temp dir is deleted when the builder drops)
    pub fn build(self) -> Config {
        Config {
            global: self.global,
            object_store: self.object_store,
            jobs: self.jobs,
        }
    }

    /// Write `config.toml` into the temp dir and keep the directory alive
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            object_store: self.object_store,
            jobs: self.jobs,
        };

        let contents = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(self.temp_dir.path().join(CONFIG_FILE), contents)
            .expect("Failed to write config file");

        (config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of the persisted configuration inside a temp dir returned by [`ConfigBuilder::persist`]
pub fn config_path(temp_dir: &Path) -> PathBuf {
    temp_dir.join(CONFIG_FILE)
}
