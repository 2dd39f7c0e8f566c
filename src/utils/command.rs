//! Utilities for running commands with proper error handling and timeouts

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::{debug, error};

fn build_command(program: &str, args: &[&str], env: &[(&str, &str)], working_dir: Option<&Path>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    for (key, value) in env {
        cmd.env(key, value);
    }
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

/// Wait for `cmd` to finish, killing it when `timeout` elapses.
/// Stdio configured on `cmd` is kept as is.
fn wait_output(mut cmd: Command, program: &str, timeout: Option<Duration>) -> Result<Output> {
    match timeout {
        Some(timeout_duration) => super::runtime::block_on(async move {
            let mut cmd = tokio::process::Command::from(cmd);
            cmd.kill_on_drop(true);
            let child = cmd
                .spawn()
                .context(format!("Failed to execute {}", program))?;
            match tokio::time::timeout(timeout_duration, child.wait_with_output()).await {
                Ok(output) => output.context(format!("Failed to wait for {}", program)),
                Err(_) => Err(anyhow::anyhow!("Command timed out after {:?}", timeout_duration)),
            }
        })?,
        None => cmd
            .spawn()
            .context(format!("Failed to execute {}", program))?
            .wait_with_output()
            .context(format!("Failed to wait for {}", program)),
    }
}

/// Render arguments for logging with `--password=` values masked
fn display_args(args: &[&str]) -> String {
    args.iter()
        .map(|arg| match arg.strip_prefix("--password=") {
            Some(_) => "--password=****",
            None => arg,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_status(program: &str, args: &[&str], output: &Output) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {} {}", program, display_args(args));
        error!("Stderr: {}", stderr);
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }
    Ok(())
}

/// Run a command with optional timeout
pub fn run_command(
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<Output> {
    let mut cmd = build_command(program, args, env, working_dir);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!("Running command: {} {}", program, display_args(args));

    let output = wait_output(cmd, program, timeout)?;
    check_status(program, args, &output)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout);
    }

    Ok(output)
}

/// Run a command and return stdout as string
pub fn run_command_stdout(
    program: &str,
    args: &[&str],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<String> {
    let output = run_command(program, args, &[], working_dir, timeout)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a command with stdout streamed straight into `output_file`
pub fn run_command_to_file(
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
    output_file: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let file = File::create(output_file)
        .with_context(|| format!("Failed to create output file {:?}", output_file))?;

    let mut cmd = build_command(program, args, env, None);
    cmd.stdout(Stdio::from(file));
    cmd.stderr(Stdio::piped());

    debug!("Running command: {} {} > {:?}", program, display_args(args), output_file);

    let output = wait_output(cmd, program, timeout)?;
    check_status(program, args, &output)
}
