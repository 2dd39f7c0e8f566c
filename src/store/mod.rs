//! Job store abstraction
//!
//! Holds job definitions, the last-run slot of every job and the run history.
//! The only write the executor performs is through [`JobStore::try_claim_running`]
//! and [`JobStore::finish_run`], which together keep at most one `running` slot
//! per job.

mod sqlite;

pub use sqlite::SqliteJobStore;

use crate::error::Result;
use crate::jobs::{BackupJob, BackupRun, JobId, NewJob};
use chrono::{DateTime, Utc};

pub trait JobStore: Send + Sync {
    /// Insert a new job, failing if (client_id, name) already exists
    fn create_job(&self, job: &NewJob) -> Result<JobId>;

    /// Insert or update the definition of a job matched by (client_id, name).
    ///
    /// `active` is only taken on insert; afterwards it belongs to [`JobStore::set_active`].
    fn upsert_job(&self, job: &NewJob) -> Result<JobId>;

    fn get_job(&self, id: JobId) -> Result<Option<BackupJob>>;

    fn list_jobs(&self) -> Result<Vec<BackupJob>>;

    /// Active jobs that carry a schedule
    fn scheduled_jobs(&self) -> Result<Vec<BackupJob>>;

    fn set_active(&self, id: JobId, active: bool) -> Result<()>;

    /// Atomically move the job's last-run slot to `running`.
    ///
    /// Returns `false` when the slot is already `running` or the job is inactive.
    fn try_claim_running(&self, id: JobId, started_at: DateTime<Utc>) -> Result<bool>;

    /// Write a terminal status into the last-run slot and append it to the history
    fn finish_run(&self, run: &BackupRun) -> Result<()>;

    fn last_run(&self, id: JobId) -> Result<Option<BackupRun>>;

    /// Most recent terminal runs, newest first
    fn run_history(&self, id: JobId, limit: usize) -> Result<Vec<BackupRun>>;
}
