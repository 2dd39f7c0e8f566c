//! Unit tests for the SQLite job store on disk

use backup_orchestrator::store::{JobStore, SqliteJobStore};
use chrono::Utc;
use test_utils::{sample_new_job, stale_running_run, OptionAssertions, RunStatus, TestContext};

#[test]
fn test_state_survives_reopen() {
    let ctx = TestContext::new();
    let db = ctx.temp_dir().join("state/jobs.db");

    let id = {
        let store = SqliteJobStore::open(&db).unwrap();
        let id = store.create_job(&sample_new_job("site", ctx.temp_dir(), &ctx.backup_dir())).unwrap();
        assert!(store.try_claim_running(id, Utc::now()).unwrap());
        let run = store.last_run(id).unwrap().assert_some();
        store.finish_run(&run.succeed(2048)).unwrap();
        id
    };

    let store = SqliteJobStore::open(&db).unwrap();
    let job = store.get_job(id).unwrap().assert_some();
    let last = job.last_run.assert_some();
    assert_eq!(last.status, RunStatus::Success);
    assert_eq!(last.artifact_size_bytes, Some(2048));
    assert_eq!(store.run_history(id, 5).unwrap().len(), 1);
}

#[test]
fn test_second_connection_sees_claim() {
    let ctx = TestContext::new();
    let db = ctx.temp_dir().join("jobs.db");

    let first = SqliteJobStore::open(&db).unwrap();
    let id = first.create_job(&sample_new_job("site", ctx.temp_dir(), &ctx.backup_dir())).unwrap();
    let second = SqliteJobStore::open(&db).unwrap();

    assert!(first.try_claim_running(id, Utc::now()).unwrap());
    assert!(!second.try_claim_running(id, Utc::now()).unwrap());
    assert!(second.get_job(id).unwrap().assert_some().is_running());
}

#[test]
fn test_history_limit_and_order() {
    let store = SqliteJobStore::open_in_memory().unwrap();
    let ctx = TestContext::new();
    let id = store.create_job(&sample_new_job("site", ctx.temp_dir(), &ctx.backup_dir())).unwrap();

    for minutes in [30, 20, 10] {
        store.finish_run(&stale_running_run(id, minutes).fail(format!("run {}", minutes))).unwrap();
    }

    let history = store.run_history(id, 2).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].message.as_deref(), Some("run 10"));
    assert_eq!(history[1].message.as_deref(), Some("run 20"));
}

#[test]
fn test_set_active_unknown_job() {
    let store = SqliteJobStore::open_in_memory().unwrap();
    assert!(store.set_active(999, true).is_err());
}
