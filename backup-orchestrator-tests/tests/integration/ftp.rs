//! FTP integration tests
//!
//! These tests require Docker and upload artifacts to a throwaway FTP server.

use super::common::{docker_exec, is_docker_available, start_container, wait_until_ready};
use backup_orchestrator::destinations::{DestinationAdapter, FtpAdapter};
use serial_test::serial;
use std::time::Duration;
use test_utils::{Destination, RemoteEndpoint, TestContext};

const CONTAINER: &str = "backup-orchestrator-test-ftp";

fn endpoint(password: &str) -> RemoteEndpoint {
    RemoteEndpoint {
        host: "127.0.0.1".to_string(),
        port: Some(2121),
        user: "backup".to_string(),
        password: password.to_string(),
        remote_path: "/nightly/site".to_string(),
    }
}

fn start_ftp() -> anyhow::Result<super::common::ContainerGuard> {
    let guard = start_container(
        CONTAINER,
        &[
            "-p",
            "2121:21",
            "-p",
            "21000-21010:21000-21010",
            "-e",
            "USERS=backup|secret|/home/backup",
            "-e",
            "ADDRESS=127.0.0.1",
        ],
        "delfer/alpine-ftp-server",
    )?;
    wait_until_ready(CONTAINER, &["sh", "-c", "netstat -ltn | grep -q ':21 '"], 30)?;
    Ok(guard)
}

#[test]
#[ignore] // Requires Docker
#[serial]
fn test_ftp_upload_creates_directories() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let _guard = start_ftp().expect("Failed to start FTP container");

    let ctx = TestContext::new();
    let artifact = ctx.create_file("site_20260301_020000_000.tar.gz.enc", "encrypted bytes");

    let adapter = FtpAdapter::new(Duration::from_secs(30));
    adapter
        .upload(&artifact, &Destination::Ftp(endpoint("secret")))
        .expect("upload failed");

    let listing = docker_exec(CONTAINER, &["ls", "/home/backup/nightly/site"]).unwrap();
    assert!(listing.contains("site_20260301_020000_000.tar.gz.enc"));
}

#[test]
#[ignore] // Requires Docker
#[serial]
fn test_ftp_bad_credentials_fail_transfer() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let _guard = start_ftp().expect("Failed to start FTP container");

    let ctx = TestContext::new();
    let artifact = ctx.create_file("site_20260301_020000_000.tar", "bytes");

    let result = FtpAdapter::new(Duration::from_secs(10)).upload(&artifact, &Destination::Ftp(endpoint("wrong")));
    assert!(result.is_err());
    assert!(artifact.exists());
}
