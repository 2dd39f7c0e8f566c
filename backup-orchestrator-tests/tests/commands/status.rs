//! Tests for the 'status' command

use super::{cli, execute_job};
use predicates::prelude::*;
use test_utils::{ConfigBuilder, TestContext};

#[test]
fn test_status_before_any_run() {
    let ctx = TestContext::with_minimal_config();
    let id = ctx.job_id("site").unwrap();

    cli(&ctx)
        .args(["status", &id.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("site"))
        .stdout(predicate::str::contains("manual only"))
        .stdout(predicate::str::contains("No runs recorded"));
}

#[test]
fn test_status_shows_history() {
    let ctx = TestContext::with_minimal_config();
    let id = execute_job(&ctx, "site");
    execute_job(&ctx, "site");

    cli(&ctx)
        .args(["status", &id.to_string(), "--history", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recent runs:"))
        .stdout(predicate::str::contains("success").count(1));
}

#[test]
fn test_status_describes_schedule() {
    let builder = ConfigBuilder::new();
    let source = builder.temp_dir().to_path_buf();
    let ctx = TestContext::from_builder(builder.add_scheduled_job("nightly", &source, "30 1 * * *"));
    let id = ctx.job_id("nightly").unwrap();

    cli(&ctx)
        .args(["status", &id.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("daily at 01:30"));
}

#[test]
fn test_status_unknown_job() {
    let ctx = TestContext::with_minimal_config();

    cli(&ctx)
        .args(["status", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Job 999 not found"));
}
