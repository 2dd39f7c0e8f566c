//! Tests for the 'list' command

use super::{cli, execute_job};
use predicates::prelude::*;
use test_utils::{ConfigBuilder, TestContext};

#[test]
fn test_list_table() {
    let ctx = TestContext::with_minimal_config();

    cli(&ctx)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("site"))
        .stdout(predicate::str::contains("never"));
}

#[test]
fn test_list_json_reports_last_run() {
    let ctx = TestContext::with_minimal_config();
    let id = execute_job(&ctx, "site");

    let output = cli(&ctx).args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let jobs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], id);
    assert_eq!(jobs[0]["name"], "site");
    assert_eq!(jobs[0]["last_run"]["status"], "success");
}

#[test]
fn test_list_masks_database_password() {
    let builder = ConfigBuilder::new().add_server_database_job("db", "db.internal:3306:shop:backup:hunter2");
    let ctx = TestContext::from_builder(builder);

    cli(&ctx)
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db.internal:3306:shop:backup:****"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_list_empty() {
    let ctx = TestContext::from_builder(ConfigBuilder::new());

    cli(&ctx)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs configured"));
}
