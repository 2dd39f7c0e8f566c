//! MySQL integration tests
//!
//! These tests require Docker and a `mysqldump` client on the host.

use super::common::{docker_exec, is_docker_available, is_tool_available, start_container, wait_until_ready};
use backup_orchestrator::archive::{extract, list_entries};
use backup_orchestrator::crypto::{plain_name, Encryptor, KeyStore};
use backup_orchestrator::store::{JobStore, SqliteJobStore};
use backup_orchestrator::utils::RealExecutor;
use backup_orchestrator::{sync_jobs, BackupExecutor};
use serial_test::serial;
use std::sync::Arc;
use test_utils::{ConfigBuilder, RunStatus, TestContext};

const CONTAINER: &str = "backup-orchestrator-test-mysql";
const PORT: &str = "33061";

fn start_mysql() -> anyhow::Result<super::common::ContainerGuard> {
    let guard = start_container(
        CONTAINER,
        &[
            "-p",
            &format!("{}:3306", PORT),
            "-e",
            "MYSQL_ROOT_PASSWORD=rootpass",
            "-e",
            "MYSQL_DATABASE=shop",
        ],
        "mysql:8.0",
    )?;
    wait_until_ready(
        CONTAINER,
        &["mysql", "-uroot", "-prootpass", "-h127.0.0.1", "-e", "SELECT 1"],
        90,
    )?;
    docker_exec(
        CONTAINER,
        &[
            "mysql",
            "-uroot",
            "-prootpass",
            "shop",
            "-e",
            "CREATE TABLE orders (id INT PRIMARY KEY, item VARCHAR(64)); \
             INSERT INTO orders VALUES (1, 'keyboard'), (2, 'monitor');",
        ],
    )?;
    Ok(guard)
}

#[test]
#[ignore] // Requires Docker and mysqldump
#[serial]
fn test_mysql_backup_round_trip() {
    if !is_docker_available() || !is_tool_available("mysqldump") {
        eprintln!("Docker or mysqldump not available, skipping test");
        return;
    }

    let _guard = start_mysql().expect("Failed to start MySQL container");

    let connection = format!("127.0.0.1:{}:shop:root:rootpass", PORT);
    let ctx = TestContext::from_builder(ConfigBuilder::new().add_server_database_job("shop", &connection));
    let config = ctx.config().unwrap().clone();

    let store = Arc::new(SqliteJobStore::open(&config.global.database_path).unwrap());
    sync_jobs(&config, store.as_ref()).unwrap();
    let id = store.list_jobs().unwrap()[0].id;

    let executor = BackupExecutor::from_config(&config, store.clone(), Arc::new(RealExecutor::new()));
    let run = executor.execute(id).unwrap();
    assert_eq!(run.status, RunStatus::Success, "run failed: {:?}", run.message);

    let artifact = ctx.backup_dir().join(ctx.list_dir(&ctx.backup_dir()).remove(0));
    let decrypted = plain_name(&artifact).unwrap();
    let key = KeyStore::new(&config.global.key_file).read_key().unwrap();
    Encryptor::new().decrypt_file(&artifact, &key, &decrypted).unwrap();

    let entries = list_entries(&decrypted).unwrap();
    assert_eq!(entries.len(), 1);

    let target = ctx.temp_dir().join("restore");
    extract(&decrypted, &target).unwrap();
    let dump = std::fs::read_to_string(target.join(&entries[0])).unwrap();
    assert!(dump.contains("CREATE TABLE `orders`"));
    assert!(dump.contains("keyboard"));
}

#[test]
#[ignore] // Requires Docker and mysqldump
#[serial]
fn test_mysql_wrong_password_records_error() {
    if !is_docker_available() || !is_tool_available("mysqldump") {
        eprintln!("Docker or mysqldump not available, skipping test");
        return;
    }

    let _guard = start_mysql().expect("Failed to start MySQL container");

    let connection = format!("127.0.0.1:{}:shop:root:wrong", PORT);
    let ctx = TestContext::from_builder(ConfigBuilder::new().add_server_database_job("shop", &connection));
    let config = ctx.config().unwrap().clone();

    let store = Arc::new(SqliteJobStore::open(&config.global.database_path).unwrap());
    sync_jobs(&config, store.as_ref()).unwrap();
    let id = store.list_jobs().unwrap()[0].id;

    let executor = BackupExecutor::from_config(&config, store.clone(), Arc::new(RealExecutor::new()));
    let run = executor.execute(id).unwrap();

    assert_eq!(run.status, RunStatus::Error);
    assert!(run.message.unwrap().contains("dump"));
    assert!(ctx.list_dir(&ctx.backup_dir()).is_empty());
}
