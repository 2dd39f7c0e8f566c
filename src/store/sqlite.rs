//! SQLite-backed job store

use super::JobStore;
use crate::error::Result;
use crate::jobs::{BackupJob, BackupRun, Destination, JobId, NewJob, RunStatus, Schedule, SourceKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS backup_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    client_id TEXT NOT NULL,
    source_kind TEXT NOT NULL,
    source_path TEXT NOT NULL,
    destination TEXT NOT NULL,
    schedule TEXT,
    retention_days INTEGER NOT NULL DEFAULT 30,
    compress INTEGER NOT NULL DEFAULT 1,
    encrypt INTEGER NOT NULL DEFAULT 1,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_status TEXT,
    last_started_at TEXT,
    last_finished_at TEXT,
    last_message TEXT,
    last_artifact_size INTEGER,
    UNIQUE (client_id, name)
);

CREATE TABLE IF NOT EXISTS backup_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES backup_jobs(id),
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    message TEXT,
    artifact_size INTEGER
);

CREATE INDEX IF NOT EXISTS idx_backup_runs_job ON backup_runs(job_id, id);
"#;

const JOB_COLUMNS: &str = "id, name, client_id, source_kind, source_path, destination, schedule, \
     retention_days, compress, encrypt, active, \
     last_status, last_started_at, last_finished_at, last_message, last_artifact_size";

pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        info!("Opened job store: {:?}", path);
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl JobStore for SqliteJobStore {
    fn create_job(&self, job: &NewJob) -> Result<JobId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO backup_jobs (
                name, client_id, source_kind, source_path, destination, schedule,
                retention_days, compress, encrypt, active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.name,
                job.client_id,
                job.source_kind.as_str(),
                job.source_path,
                destination_json(&job.destination)?,
                job.schedule.as_ref().map(|s| s.to_string()),
                job.retention_days,
                job.compress,
                job.encrypt,
                job.active,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        info!("Backup job created: {} (ID: {})", job.name, id);
        Ok(id)
    }

    fn upsert_job(&self, job: &NewJob) -> Result<JobId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO backup_jobs (
                name, client_id, source_kind, source_path, destination, schedule,
                retention_days, compress, encrypt, active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (client_id, name) DO UPDATE SET
                source_kind = excluded.source_kind,
                source_path = excluded.source_path,
                destination = excluded.destination,
                schedule = excluded.schedule,
                retention_days = excluded.retention_days,
                compress = excluded.compress,
                encrypt = excluded.encrypt",
            params![
                job.name,
                job.client_id,
                job.source_kind.as_str(),
                job.source_path,
                destination_json(&job.destination)?,
                job.schedule.as_ref().map(|s| s.to_string()),
                job.retention_days,
                job.compress,
                job.encrypt,
                job.active,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM backup_jobs WHERE client_id = ?1 AND name = ?2",
            params![job.client_id, job.name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_job(&self, id: JobId) -> Result<Option<BackupJob>> {
        let conn = self.conn.lock();
        let job = conn
            .query_row(
                &format!("SELECT {} FROM backup_jobs WHERE id = ?1", JOB_COLUMNS),
                params![id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    fn list_jobs(&self) -> Result<Vec<BackupJob>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM backup_jobs ORDER BY client_id, name",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn scheduled_jobs(&self) -> Result<Vec<BackupJob>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM backup_jobs WHERE active = 1 AND schedule IS NOT NULL ORDER BY id",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn set_active(&self, id: JobId, active: bool) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE backup_jobs SET active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if changed == 0 {
            return Err(crate::error::BackupError::JobNotFound(id));
        }
        Ok(())
    }

    fn try_claim_running(&self, id: JobId, started_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE backup_jobs SET
                last_status = 'running',
                last_started_at = ?1,
                last_finished_at = NULL,
                last_message = NULL,
                last_artifact_size = NULL
             WHERE id = ?2 AND active = 1
               AND (last_status IS NULL OR last_status <> 'running')",
            params![started_at.to_rfc3339(), id],
        )?;
        debug!("Claim for job {}: {}", id, changed == 1);
        Ok(changed == 1)
    }

    fn finish_run(&self, run: &BackupRun) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let finished_at = run.finished_at.map(|t| t.to_rfc3339());
        let size = run.artifact_size_bytes.map(|s| s as i64);

        tx.execute(
            "UPDATE backup_jobs SET
                last_status = ?1,
                last_started_at = ?2,
                last_finished_at = ?3,
                last_message = ?4,
                last_artifact_size = ?5
             WHERE id = ?6",
            params![
                run.status.as_str(),
                run.started_at.to_rfc3339(),
                finished_at,
                run.message,
                size,
                run.job_id,
            ],
        )?;
        tx.execute(
            "INSERT INTO backup_runs (job_id, started_at, finished_at, status, message, artifact_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run.job_id,
                run.started_at.to_rfc3339(),
                finished_at,
                run.status.as_str(),
                run.message,
                size,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn last_run(&self, id: JobId) -> Result<Option<BackupRun>> {
        Ok(self.get_job(id)?.and_then(|job| job.last_run))
    }

    fn run_history(&self, id: JobId, limit: usize) -> Result<Vec<BackupRun>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT job_id, started_at, finished_at, status, message, artifact_size
             FROM backup_runs WHERE job_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let runs = stmt
            .query_map(params![id, limit as i64], |row| {
                Ok(BackupRun {
                    job_id: row.get(0)?,
                    started_at: timestamp(row, 1)?,
                    finished_at: optional_timestamp(row, 2)?,
                    status: status(row, 3)?,
                    message: row.get(4)?,
                    artifact_size_bytes: row.get::<_, Option<i64>>(5)?.map(|s| s as u64),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }
}

fn destination_json(destination: &Destination) -> Result<String> {
    serde_json::to_string(destination)
        .map_err(|e| crate::error::BackupError::Store(format!("Failed to encode destination: {}", e)))
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<BackupJob> {
    let id: JobId = row.get(0)?;

    let source_kind: String = row.get(3)?;
    let source_kind = SourceKind::parse(&source_kind)
        .ok_or_else(|| conversion_error(3, format!("unknown source kind '{}'", source_kind)))?;

    let destination: String = row.get(5)?;
    let destination: Destination = serde_json::from_str(&destination)
        .map_err(|e| conversion_error(5, format!("invalid destination: {}", e)))?;

    let schedule = row
        .get::<_, Option<String>>(6)?
        .map(|s| Schedule::parse(&s))
        .transpose()
        .map_err(|e| conversion_error(6, e.to_string()))?;

    let last_run = match row.get::<_, Option<String>>(11)? {
        Some(_) => Some(BackupRun {
            job_id: id,
            started_at: timestamp(row, 12)?,
            finished_at: optional_timestamp(row, 13)?,
            status: status(row, 11)?,
            message: row.get(14)?,
            artifact_size_bytes: row.get::<_, Option<i64>>(15)?.map(|s| s as u64),
        }),
        None => None,
    };

    Ok(BackupJob {
        id,
        name: row.get(1)?,
        client_id: row.get(2)?,
        source_kind,
        source_path: row.get(4)?,
        destination,
        schedule,
        retention_days: row.get(7)?,
        compress: row.get(8)?,
        encrypt: row.get(9)?,
        active: row.get(10)?,
        last_run,
    })
}

fn status(row: &Row<'_>, idx: usize) -> rusqlite::Result<RunStatus> {
    let value: String = row.get(idx)?;
    RunStatus::parse(&value).ok_or_else(|| conversion_error(idx, format!("unknown status '{}'", value)))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_timestamp(idx, &value)
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|value| parse_timestamp(idx, &value))
        .transpose()
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("invalid timestamp '{}': {}", value, e)))
}
