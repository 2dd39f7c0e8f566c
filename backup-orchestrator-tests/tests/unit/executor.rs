//! Unit tests for the backup executor wired from configuration
//!
//! External tools are mocked; the local destination, key store and job store are real.

use backup_orchestrator::archive::{extract, list_entries};
use backup_orchestrator::crypto::{plain_name, Encryptor, KeyStore};
use backup_orchestrator::error::BackupError;
use backup_orchestrator::store::{JobStore, SqliteJobStore};
use backup_orchestrator::utils::locker::JobLock;
use backup_orchestrator::{sync_jobs, BackupExecutor, Config};
use std::sync::Arc;
use test_utils::{
    create_aged_artifact, create_source_tree, stale_running_run, ConfigBuilder, MockExecutor, MockResponse,
    OptionAssertions, RunStatus, TestContext,
};

struct Harness {
    _ctx: TestContext,
    config: Config,
    store: Arc<SqliteJobStore>,
    executor: BackupExecutor,
}

impl Harness {
    fn new(builder: ConfigBuilder, tools: MockExecutor) -> Self {
        let ctx = TestContext::from_builder(builder);
        let config = ctx.config().cloned().assert_some();
        let store = Arc::new(SqliteJobStore::open(&config.global.database_path).unwrap());
        sync_jobs(&config, store.as_ref()).unwrap();
        let executor = BackupExecutor::from_config(&config, store.clone(), Arc::new(tools));
        Self {
            _ctx: ctx,
            config,
            store,
            executor,
        }
    }

    fn job_id(&self, name: &str) -> i64 {
        self.store
            .list_jobs()
            .unwrap()
            .into_iter()
            .find(|j| j.name == name)
            .assert_some()
            .id
    }

    fn backups(&self) -> Vec<String> {
        let dir = self.config.global.scratch_dir.parent().unwrap().join("backups");
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn builder_with_source() -> (ConfigBuilder, std::path::PathBuf) {
    let builder = ConfigBuilder::new();
    let source = builder.temp_dir().join("x");
    std::fs::create_dir_all(&source).unwrap();
    create_source_tree(&source);
    (builder, source)
}

#[test]
fn test_local_encrypted_backup_restores() {
    let (builder, source) = builder_with_source();
    let harness = Harness::new(builder.add_directory_job("x", &source), MockExecutor::new());
    let id = harness.job_id("x");

    let run = harness.executor.execute(id).unwrap();
    assert_eq!(run.status, RunStatus::Success);

    let backups = harness.backups();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].starts_with("x_") && backups[0].ends_with(".tar.gz.enc"));

    // Decrypt and unpack with the persisted key
    let backup_dir = harness.config.global.scratch_dir.parent().unwrap().join("backups");
    let encrypted = backup_dir.join(&backups[0]);
    let decrypted = plain_name(&encrypted).assert_some();
    let key = KeyStore::new(&harness.config.global.key_file).read_key().unwrap();
    Encryptor::new().decrypt_file(&encrypted, &key, &decrypted).unwrap();

    let restore = backup_dir.join("restore");
    extract(&decrypted, &restore).unwrap();
    assert_eq!(
        std::fs::read_to_string(restore.join("x/index.html")).unwrap(),
        "<html>hello</html>"
    );
    assert_eq!(list_entries(&decrypted).unwrap().len(), 4);

    let last = harness.store.last_run(id).unwrap().assert_some();
    assert_eq!(last.artifact_size_bytes, run.artifact_size_bytes);
}

#[test]
fn test_scratch_left_empty_after_local_run() {
    let (builder, source) = builder_with_source();
    let harness = Harness::new(builder.add_directory_job("x", &source), MockExecutor::new());

    harness.executor.execute(harness.job_id("x")).unwrap();

    let leftovers = std::fs::read_dir(&harness.config.global.scratch_dir).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_failing_dump_records_error() {
    let builder = ConfigBuilder::new().add_server_database_job("db", "host:1234:db:user:pass");
    let tools = MockExecutor::new().expect("mysqldump", MockResponse::failure("mysqldump: Got error: 2005"));
    let harness = Harness::new(builder, tools);
    let id = harness.job_id("db");

    let run = harness.executor.execute(id).unwrap();

    assert_eq!(run.status, RunStatus::Error);
    assert!(run.message.as_deref().unwrap_or_default().contains("dump"));
    assert!(harness.backups().is_empty());
    assert_eq!(harness.store.run_history(id, 10).unwrap()[0].status, RunStatus::Error);
}

#[test]
fn test_held_lock_rejects_execute() {
    let (builder, source) = builder_with_source();
    let harness = Harness::new(builder.add_directory_job("x", &source), MockExecutor::new());
    let id = harness.job_id("x");

    let mut lock = JobLock::open(&harness.config.global.lock_directory, id).unwrap();
    let _held = lock.try_acquire().unwrap();

    let result = harness.executor.execute(id);
    assert!(matches!(result, Err(BackupError::AlreadyRunning(_))));
    assert!(result.unwrap_err().to_string().contains("already running"));
    assert!(harness.store.run_history(id, 10).unwrap().is_empty());
}

#[test]
fn test_stale_running_slot_is_recovered() {
    let (builder, source) = builder_with_source();
    let harness = Harness::new(builder.add_directory_job("x", &source), MockExecutor::new());
    let id = harness.job_id("x");

    assert!(harness
        .store
        .try_claim_running(id, stale_running_run(id, 90).started_at)
        .unwrap());

    let run = harness.executor.execute(id).unwrap();
    assert_eq!(run.status, RunStatus::Success);

    let history = harness.store.run_history(id, 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].message.as_deref(), Some("interrupted"));
}

#[test]
fn test_run_prunes_expired_artifacts() {
    let (builder, source) = builder_with_source();
    let backup_dir = builder.backup_dir();
    let expired = create_aged_artifact(&backup_dir, "x", 45);
    let harness = Harness::new(builder.add_directory_job("x", &source), MockExecutor::new());

    harness.executor.execute(harness.job_id("x")).unwrap();

    assert!(!expired.exists());
    assert_eq!(harness.backups().len(), 1);
}

#[test]
fn test_disabled_job_is_rejected() {
    let (builder, source) = builder_with_source();
    let harness = Harness::new(builder.add_inactive_job("x", &source), MockExecutor::new());

    let result = harness.executor.execute(harness.job_id("x"));
    assert!(matches!(result, Err(BackupError::JobInactive(_))));
}
