//! Test fixtures and sample data
//!
//! Provides pre-built jobs, runs, source trees and config templates.

use backup_orchestrator::jobs::{
    BackupJob, BackupRun, Destination, JobId, NewJob, RunStatus, Schedule, SourceKind,
};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// A job definition backing up `source` into `backup_dir`
pub fn sample_new_job(name: &str, source: &Path, backup_dir: &Path) -> NewJob {
    NewJob {
        name: name.to_string(),
        client_id: "test-client".to_string(),
        source_kind: SourceKind::Directory,
        source_path: source.display().to_string(),
        destination: Destination::Local {
            path: backup_dir.to_path_buf(),
        },
        schedule: Some(Schedule::Daily { hour: 2, minute: 0 }),
        retention_days: 7,
        compress: true,
        encrypt: true,
        active: true,
    }
}

/// A persisted job with no run history
pub fn sample_job(id: JobId) -> BackupJob {
    BackupJob {
        id,
        name: format!("job-{}", id),
        client_id: "test-client".to_string(),
        source_kind: SourceKind::Directory,
        source_path: "/srv/data".to_string(),
        destination: Destination::Local {
            path: PathBuf::from("/backups"),
        },
        schedule: Some(Schedule::Daily { hour: 2, minute: 0 }),
        retention_days: 7,
        compress: true,
        encrypt: true,
        active: true,
        last_run: None,
    }
}

/// A finished run with the given status
pub fn sample_run(job_id: JobId, status: RunStatus) -> BackupRun {
    let run = BackupRun::start(job_id);
    match status {
        RunStatus::Running => run,
        RunStatus::Success => run.succeed(4096),
        RunStatus::Error => run.fail("transfer failed: connection refused"),
    }
}

/// A running slot claimed `minutes_ago` minutes in the past
pub fn stale_running_run(job_id: JobId, minutes_ago: i64) -> BackupRun {
    let mut run = BackupRun::start(job_id);
    run.started_at = Utc::now() - Duration::minutes(minutes_ago);
    run
}

/// Populate `root` with a small nested tree and return the relative file paths
pub fn create_source_tree(root: &Path) -> Vec<PathBuf> {
    let files = [
        ("index.html", "<html>hello</html>"),
        ("assets/app.css", "body { margin: 0 }"),
        ("assets/img/logo.svg", "<svg/>"),
        ("uploads/2026/report.txt", "quarterly numbers"),
    ];

    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create source dir");
        }
        fs::write(&path, contents).expect("Failed to write source file");
    }

    files.iter().map(|(relative, _)| PathBuf::from(relative)).collect()
}

/// Create an embedded SQLite database with a couple of tables and rows
pub fn create_sqlite_db(path: &Path) -> PathBuf {
    let conn = rusqlite::Connection::open(path).expect("Failed to create sqlite db");
    conn.execute_batch(
        r#"
CREATE TABLE customers (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, balance REAL, avatar BLOB);
CREATE INDEX idx_customers_name ON customers(name);
INSERT INTO customers (name, balance, avatar) VALUES ('Alice', 12.5, X'CAFE');
INSERT INTO customers (name, balance, avatar) VALUES ('O''Brien', NULL, NULL);
CREATE TABLE notes (body TEXT);
INSERT INTO notes (body) VALUES ('first note');
CREATE VIEW rich AS SELECT name FROM customers WHERE balance > 10;
"#,
    )
    .expect("Failed to populate sqlite db");
    path.to_path_buf()
}

/// Artifact file name as the archive builder produces it at a given local time
pub fn artifact_name(job_name: &str, at: NaiveDateTime, compress: bool, encrypt: bool) -> String {
    let mut name = format!("{}_{}", job_name, at.format("%Y%m%d_%H%M%S_%3f"));
    name.push_str(if compress { ".tar.gz" } else { ".tar" });
    if encrypt {
        name.push_str(".enc");
    }
    name
}

/// Create a fake artifact in `dir` whose mtime is `days_old` days in the past
pub fn create_aged_artifact(dir: &Path, job_name: &str, days_old: i64) -> PathBuf {
    let at = Local::now().naive_local() - Duration::days(days_old);
    let path = dir.join(artifact_name(job_name, at, true, true));
    fs::write(&path, b"artifact").expect("Failed to write artifact");

    let mtime = Local
        .from_local_datetime(&at)
        .single()
        .map(|dt| std::time::SystemTime::from(dt.with_timezone(&Utc)))
        .expect("Ambiguous local time");
    let file = fs::File::options()
        .write(true)
        .open(&path)
        .expect("Failed to open artifact");
    file.set_modified(mtime).expect("Failed to set mtime");
    path
}

/// Fixed UTC timestamp for deterministic assertions
pub fn fixed_time(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("Invalid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
[global]
scratch_dir = "{scratch_dir}"
database_path = "{database_path}"
key_file = "{key_file}"
lock_directory = "{lock_directory}"
log_directory = "{log_directory}"

[jobs.site]
client_id = "acme"
source_kind = "directory"
source_path = "{source_path}"
schedule = "0 2 * * *"
destination = { type = "local", path = "{backup_path}" }
"#
}

/// Config with one job per destination kind
pub fn multi_destination_config_toml() -> &'static str {
    r#"
[global]
scratch_dir = "{scratch_dir}"
database_path = "{database_path}"
key_file = "{key_file}"

[object_store]
bucket = "nightly"
access_key = "AKIA-TEST"
secret_key = "secret"

[jobs.site]
source_kind = "directory"
source_path = "/srv/site"
destination = { type = "local", path = "/backups" }

[jobs.shop-db]
source_kind = "database"
source_path = "db.internal:3306:shop:backup:hunter2"
schedule = "15 3 * * 1-5"
retention_days = 14
destination = { type = "ftp", host = "ftp.example.com", user = "backup", password = "pw", remote_path = "/nightly" }

[jobs.office]
source_kind = "file"
source_path = "/srv/office/ledger.xlsx"
destination = { type = "smb", host = "nas.local", user = "svc", password = "pw", remote_path = "backups/office" }

[jobs.archive]
source_kind = "directory"
source_path = "/srv/archive"
compress = false
encrypt = false
destination = { type = "object_store", prefix = "cold" }
"#
}

/// Fill `{placeholder}` fields of a template
pub fn render_template(template: &str, values: &[(&str, &Path)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), &value.display().to_string())
    })
}
