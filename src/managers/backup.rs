//! Backup executor - runs one job through archive, encrypt, transfer and prune

use crate::archive::ArchiveBuilder;
use crate::config::Config;
use crate::crypto::{Encryptor, KeyStore};
use crate::destinations::AdapterSet;
use crate::error::{BackupError, Result};
use crate::jobs::{BackupJob, BackupRun, JobId, RunStatus};
use crate::managers::retention::RetentionManager;
use crate::store::JobStore;
use crate::utils::executor::CommandExecutor;
use crate::utils::locker::JobLock;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub struct BackupExecutor {
    store: Arc<dyn JobStore>,
    archiver: ArchiveBuilder,
    encryptor: Encryptor,
    keys: KeyStore,
    adapters: AdapterSet,
    retention: RetentionManager,
    lock_dir: PathBuf,
}

impl BackupExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        archiver: ArchiveBuilder,
        keys: KeyStore,
        adapters: AdapterSet,
        lock_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            archiver,
            encryptor: Encryptor::new(),
            keys,
            adapters,
            retention: RetentionManager::new(),
            lock_dir: lock_dir.into(),
        }
    }

    /// Wire up the executor from configuration
    pub fn from_config(config: &Config, store: Arc<dyn JobStore>, executor: Arc<dyn CommandExecutor>) -> Self {
        let global = &config.global;
        let archiver = ArchiveBuilder::new(
            &global.scratch_dir,
            executor.clone(),
            global.dump_tool.clone(),
            Duration::from_secs(global.dump_timeout_seconds),
        );

        Self::new(
            store,
            archiver,
            KeyStore::new(&global.key_file),
            AdapterSet::standard(config, executor),
            &global.lock_directory,
        )
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run a job to a terminal state and return the recorded run.
    ///
    /// `Err` means the run never started: unknown or inactive job, another run
    /// in progress, or the job store being unavailable. Every started run ends
    /// with a `Success` or `Error` row, whatever happens in between.
    pub fn execute(&self, job_id: JobId) -> Result<BackupRun> {
        let job = self.load_active_job(job_id)?;

        let mut lock = JobLock::open(&self.lock_dir, job_id)?;
        let _guard = lock.try_acquire()?;

        let started_at = Utc::now();
        if !self.store.try_claim_running(job_id, started_at)? {
            self.recover_stale_run(job_id)?;
            if !self.store.try_claim_running(job_id, started_at)? {
                // The claim only fails here if the job was disabled meanwhile
                self.load_active_job(job_id)?;
                return Err(BackupError::AlreadyRunning(job_id));
            }
        }

        info!("Starting backup job {} ('{}')", job.id, job.name);
        let timer = Instant::now();

        let mut run = BackupRun::start(job_id);
        run.started_at = started_at;
        let run = match self.run_stages(&job) {
            Ok(size) => run.succeed(size),
            Err(message) => run.fail(message),
        };

        match run.status {
            RunStatus::Success => info!(
                "Backup job {} ('{}') completed in {:.1}s: {}",
                job.id,
                job.name,
                timer.elapsed().as_secs_f64(),
                run.message.as_deref().unwrap_or_default()
            ),
            _ => error!(
                "Backup job {} ('{}') failed: {}",
                job.id,
                job.name,
                run.message.as_deref().unwrap_or_default()
            ),
        }

        if let Err(e) = self.store.finish_run(&run) {
            error!("Failed to record result of job {}: {}", job_id, e);
            return Err(e);
        }
        Ok(run)
    }

    fn load_active_job(&self, job_id: JobId) -> Result<BackupJob> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or(BackupError::JobNotFound(job_id))?;
        if !job.active {
            return Err(BackupError::JobInactive(job_id));
        }
        Ok(job)
    }

    /// Close a `running` slot left behind by a process that died mid-run.
    /// Only called while holding the job lock, so no live run can own the slot.
    fn recover_stale_run(&self, job_id: JobId) -> Result<()> {
        if let Some(stale) = self.store.last_run(job_id)? {
            if stale.status == RunStatus::Running {
                warn!(
                    "Job {} has a stale running slot from {}, marking it interrupted",
                    job_id, stale.started_at
                );
                self.store.finish_run(&stale.fail("interrupted"))?;
            }
        }
        Ok(())
    }

    /// Archive, encrypt, transfer and prune. Returns the artifact size or the
    /// message recorded on the failed run.
    fn run_stages(&self, job: &BackupJob) -> std::result::Result<u64, String> {
        let key = if job.encrypt {
            Some(self.keys.get_or_create_key().map_err(|e| match e {
                BackupError::KeyUnavailable(_) => e.to_string(),
                other => format!("encryption key unavailable: {}", other),
            })?)
        } else {
            None
        };

        let adapter = self
            .adapters
            .for_destination(&job.destination)
            .map_err(|e| stage_message("transfer failed", e))?;

        let mut artifact = self
            .archiver
            .build(job)
            .map_err(|e| format!("archive build failed: {}", e))?;

        if let Some(key) = key {
            let encrypted = self.encryptor.encrypt_file(&artifact, &key);
            remove_scratch(&artifact);
            artifact = encrypted.map_err(|e| stage_message("encryption failed", e))?;
        }

        let size = fs::metadata(&artifact)
            .map(|m| m.len())
            .map_err(|e| format!("archive build failed: {}", e))?;

        info!(
            "Transferring {:?} to {}",
            artifact,
            job.destination.describe()
        );
        if let Err(e) = adapter.upload(&artifact, &job.destination) {
            warn!("Artifact retained at {:?}", artifact);
            return Err(stage_message("transfer failed", e));
        }

        if !job.destination.is_local() {
            remove_scratch(&artifact);
        }

        self.retention.prune(job, adapter.as_ref());
        Ok(size)
    }
}

/// `"<stage>: <cause>"` without repeating the stage when the error already names it
fn stage_message(stage: &str, err: BackupError) -> String {
    match err {
        BackupError::EncryptionFailed(cause) | BackupError::TransferFailed(cause) => {
            format!("{}: {}", stage, cause)
        }
        other => format!("{}: {}", stage, other),
    }
}

fn remove_scratch(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove scratch file {:?}: {}", path, e);
    }
}
