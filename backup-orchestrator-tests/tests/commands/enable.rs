//! Tests for the 'enable' and 'disable' commands

use super::cli;
use predicates::prelude::*;
use test_utils::TestContext;

fn active_flag(ctx: &TestContext) -> bool {
    let output = cli(ctx).args(["list", "--json"]).output().unwrap();
    let jobs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    jobs[0]["active"].as_bool().unwrap()
}

#[test]
fn test_disable_survives_config_resync() {
    let ctx = TestContext::with_minimal_config();
    let id = ctx.job_id("site").unwrap().to_string();

    cli(&ctx)
        .args(["disable", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));

    // Every command re-syncs the config; the toggle must stick
    assert!(!active_flag(&ctx));
}

#[test]
fn test_disabled_job_cannot_execute() {
    let ctx = TestContext::with_minimal_config();
    let id = ctx.job_id("site").unwrap().to_string();

    cli(&ctx).args(["disable", &id]).assert().success();
    cli(&ctx)
        .args(["execute", &id])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("inactive"));

    cli(&ctx).args(["enable", &id]).assert().success();
    assert!(active_flag(&ctx));
    cli(&ctx).args(["execute", &id]).assert().success();
}

#[test]
fn test_enable_unknown_job() {
    let ctx = TestContext::with_minimal_config();

    cli(&ctx).args(["enable", "777"]).assert().failure();
}
