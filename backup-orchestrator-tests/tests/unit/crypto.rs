//! Unit tests for the key store and artifact encryption

use backup_orchestrator::crypto::{plain_name, Encryptor, KeyStore};
use backup_orchestrator::error::BackupError;
use std::fs;
use test_utils::{ResultAssertions, TestContext};

#[test]
fn test_key_survives_new_store_instances() {
    let ctx = TestContext::new();
    let path = ctx.temp_dir().join("keys/backup.key");

    let first = KeyStore::new(&path).get_or_create_key().assert_ok();
    let second = KeyStore::new(&path).get_or_create_key().assert_ok();

    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(fs::read(&path).unwrap().len(), 32);
}

#[test]
fn test_encrypted_artifact_decrypts_with_same_key() {
    let ctx = TestContext::new();
    let plain = ctx.create_file("site_20260301_020000_000.tar.gz", "tarball bytes");
    let keys = KeyStore::new(ctx.temp_dir().join("backup.key"));
    let key = keys.get_or_create_key().unwrap();

    let encrypted = Encryptor::new().encrypt_file(&plain, &key).unwrap();
    assert_ne!(fs::read(&encrypted).unwrap(), b"tarball bytes");

    let output = ctx.temp_dir().join("restored.tar.gz");
    let key = keys.read_key().unwrap();
    Encryptor::new().decrypt_file(&encrypted, &key, &output).unwrap();
    assert_eq!(fs::read_to_string(output).unwrap(), "tarball bytes");
}

#[test]
fn test_decrypt_with_other_key_writes_nothing() {
    let ctx = TestContext::new();
    let plain = ctx.create_file("a.tar", "payload");

    let key = KeyStore::new(ctx.temp_dir().join("one.key")).get_or_create_key().unwrap();
    let other = KeyStore::new(ctx.temp_dir().join("two.key")).get_or_create_key().unwrap();
    let encrypted = Encryptor::new().encrypt_file(&plain, &key).unwrap();

    let output = ctx.temp_dir().join("out.tar");
    let result = Encryptor::new().decrypt_file(&encrypted, &other, &output);

    assert!(matches!(result, Err(BackupError::IntegrityCheckFailed(_))));
    assert!(!output.exists());
}

#[test]
fn test_unreadable_key_location_is_unavailable() {
    let ctx = TestContext::new();
    // A regular file where the key's parent directory should be
    let blocker = ctx.create_file("blocker", "");
    let store = KeyStore::new(blocker.join("backup.key"));

    store.get_or_create_key().assert_err_contains("KeyUnavailable");
}

#[test]
fn test_plain_name() {
    let path = std::path::Path::new("/tmp/site_20260301_020000_000.tar.gz.enc");
    assert_eq!(
        plain_name(path).unwrap(),
        std::path::Path::new("/tmp/site_20260301_020000_000.tar.gz")
    );
    assert!(plain_name(std::path::Path::new("/tmp/site.tar.gz")).is_none());
    assert!(plain_name(std::path::Path::new("/tmp/.enc")).is_none());
}
