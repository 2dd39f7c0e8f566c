//! Common utilities for integration tests
//!
//! This module provides cleanup guards and helper functions for integration tests.

use anyhow::Result;
use std::process::Command;
use std::thread;
use std::time::Duration;

/// Guard that ensures Docker container cleanup on drop (even on panic)
pub struct ContainerGuard {
    name: String,
}

impl ContainerGuard {
    pub fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        cleanup_container(&self.name);
    }
}

/// Helper to stop and remove a Docker container
/// The -v flag also removes anonymous volumes associated with the container
fn cleanup_container(name: &str) {
    let _ = Command::new("docker").args(["stop", name]).output();
    let _ = Command::new("docker").args(["rm", "-v", name]).output();
}

/// Helper to check if Docker is available
pub fn is_docker_available() -> bool {
    Command::new("docker")
        .args(["ps"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Helper to check if a host tool is on PATH
pub fn is_tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Start a detached container; `args` go between `run -d --name <name>` and the image
pub fn start_container(name: &str, args: &[&str], image: &str) -> Result<ContainerGuard> {
    cleanup_container(name);

    let output = Command::new("docker")
        .args(["run", "-d", "--name", name])
        .args(args)
        .arg(image)
        .output()?;

    if !output.status.success() {
        anyhow::bail!(
            "docker run {} failed: {}",
            image,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(ContainerGuard::new(name.to_string()))
}

/// Poll `docker exec <name> <check...>` until it succeeds
pub fn wait_until_ready(name: &str, check: &[&str], attempts: u32) -> Result<()> {
    for _ in 0..attempts {
        let ready = Command::new("docker")
            .arg("exec")
            .arg(name)
            .args(check)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if ready {
            return Ok(());
        }
        thread::sleep(Duration::from_secs(1));
    }

    Err(anyhow::anyhow!("container {} failed to become ready", name))
}

/// Run a command inside a container and return stdout
pub fn docker_exec(name: &str, command: &[&str]) -> Result<String> {
    let output = Command::new("docker").arg("exec").arg(name).args(command).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "docker exec failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
