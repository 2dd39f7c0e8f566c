//! Command tests for backup-orchestrator
//!
//! These tests drive the CLI binary against temporary configurations.

mod enable;
mod execute;
mod list;
mod status;

use assert_cmd::Command;
use test_utils::TestContext;

/// The CLI pointed at the context's persisted config
pub fn cli(ctx: &TestContext) -> Command {
    let mut cmd = Command::cargo_bin("backup-orchestrator").expect("binary not built");
    cmd.arg("--config").arg(ctx.config_path());
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run `execute` for the named job and return its id
pub fn execute_job(ctx: &TestContext, name: &str) -> i64 {
    let id = ctx.job_id(name).expect("job not synced");
    cli(ctx).args(["execute", &id.to_string()]).assert().success();
    id
}
