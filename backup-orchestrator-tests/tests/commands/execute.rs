//! Tests for the 'execute' command

use super::{cli, execute_job};
use predicates::prelude::*;
use test_utils::{create_source_tree, ConfigBuilder, TestContext};

#[test]
fn test_execute_directory_job_succeeds() {
    let ctx = TestContext::with_minimal_config();
    let id = ctx.job_id("site").unwrap();

    cli(&ctx)
        .args(["execute", &id.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Backup job {}: SUCCESS", id)))
        .stdout(predicate::str::contains("bytes"));

    let backups = ctx.list_dir(&ctx.backup_dir());
    assert_eq!(backups.len(), 1);
    assert!(backups[0].starts_with("site_") && backups[0].ends_with(".tar.gz.enc"));
}

#[test]
fn test_execute_twice_keeps_both_artifacts() {
    let builder = ConfigBuilder::new();
    let source = builder.temp_dir().join("data");
    std::fs::create_dir_all(&source).unwrap();
    create_source_tree(&source);
    let ctx = TestContext::from_builder(builder.add_directory_job("data", &source));

    execute_job(&ctx, "data");
    execute_job(&ctx, "data");

    assert_eq!(ctx.list_dir(&ctx.backup_dir()).len(), 2);
}

#[test]
fn test_execute_with_failing_dump_tool() {
    let builder = ConfigBuilder::new()
        .with_dump_tool("backup-orchestrator-missing-dump-tool")
        .add_server_database_job("db", "host:1234:db:user:pass");
    let ctx = TestContext::from_builder(builder);
    let id = ctx.job_id("db").unwrap();

    cli(&ctx)
        .args(["execute", &id.to_string()])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains(format!("Backup job {}: FAILED", id)))
        .stdout(predicate::str::contains("dump"));

    assert!(ctx.list_dir(&ctx.backup_dir()).is_empty());
}

#[test]
fn test_execute_missing_source_fails() {
    let builder = ConfigBuilder::new();
    let missing = builder.temp_dir().join("does-not-exist");
    let ctx = TestContext::from_builder(builder.add_directory_job("ghost", &missing));
    let id = ctx.job_id("ghost").unwrap();

    cli(&ctx)
        .args(["execute", &id.to_string()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("archive build failed"));
}

#[test]
fn test_execute_unknown_job() {
    let ctx = TestContext::with_minimal_config();

    cli(&ctx)
        .args(["execute", "4242"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Backup job 4242: FAILED"))
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn test_execute_requires_numeric_id() {
    let ctx = TestContext::with_minimal_config();

    cli(&ctx).args(["execute", "site"]).assert().failure();
}

#[test]
fn test_failed_run_reaches_log_file() {
    let builder = ConfigBuilder::new();
    let missing = builder.temp_dir().join("does-not-exist");
    let log_dir = builder.temp_dir().join("logs");
    let ctx = TestContext::from_builder(builder.add_directory_job("ghost", &missing));
    let id = ctx.job_id("ghost").unwrap();

    cli(&ctx).args(["execute", &id.to_string()]).assert().code(1);

    let logs = ctx.list_dir(&log_dir);
    assert_eq!(logs.len(), 1, "{:?}", logs);
    let content = std::fs::read_to_string(log_dir.join(&logs[0])).unwrap();
    assert!(content.contains("archive build failed"), "{}", content);
}
