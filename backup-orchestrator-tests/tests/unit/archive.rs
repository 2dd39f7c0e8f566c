//! Unit tests for archive building
//!
//! These tests verify archive layout, naming and database dumps using a mock executor.

use backup_orchestrator::archive::{extract, is_job_artifact, list_entries, ArchiveBuilder};
use backup_orchestrator::error::BackupError;
use rstest::rstest;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{
    create_source_tree, create_sqlite_db, sample_job, MockExecutor, MockResponse, SourceKind, TestContext,
};

fn builder(ctx: &TestContext, executor: Arc<MockExecutor>) -> ArchiveBuilder {
    ArchiveBuilder::new(
        ctx.temp_dir().join("scratch"),
        executor,
        "mysqldump",
        Duration::from_secs(30),
    )
}

#[test]
fn test_directory_archive_preserves_relative_layout() {
    let ctx = TestContext::new();
    let source = ctx.create_subdir("site");
    let files = create_source_tree(&source);

    let mut job = sample_job(1);
    job.name = "site".to_string();
    job.source_path = source.display().to_string();

    let artifact = builder(&ctx, Arc::new(MockExecutor::new())).build(&job).unwrap();
    let entries = list_entries(&artifact).unwrap();

    for file in files {
        assert!(
            entries.contains(&PathBuf::from("site").join(&file)),
            "missing {:?} in {:?}",
            file,
            entries
        );
    }
}

#[test]
fn test_extract_restores_contents() {
    let ctx = TestContext::new();
    let source = ctx.create_subdir("site");
    create_source_tree(&source);

    let mut job = sample_job(1);
    job.name = "site".to_string();
    job.source_path = source.display().to_string();

    let artifact = builder(&ctx, Arc::new(MockExecutor::new())).build(&job).unwrap();
    let target = ctx.temp_dir().join("restore");
    extract(&artifact, &target).unwrap();

    let restored = std::fs::read_to_string(target.join("site/uploads/2026/report.txt")).unwrap();
    assert_eq!(restored, "quarterly numbers");
}

#[rstest]
#[case(true, ".tar.gz")]
#[case(false, ".tar")]
fn test_artifact_extension(#[case] compress: bool, #[case] suffix: &str) {
    let ctx = TestContext::new();
    let file = ctx.create_file("notes.txt", "hello");

    let mut job = sample_job(2);
    job.name = "notes".to_string();
    job.source_kind = SourceKind::File;
    job.source_path = file.display().to_string();
    job.compress = compress;

    let artifact = builder(&ctx, Arc::new(MockExecutor::new())).build(&job).unwrap();
    let name = artifact.file_name().unwrap().to_string_lossy().into_owned();

    assert!(name.ends_with(suffix), "{} should end with {}", name, suffix);
    assert!(is_job_artifact("notes", &name));
}

#[test]
fn test_missing_source_leaves_scratch_empty() {
    let ctx = TestContext::new();
    let mut job = sample_job(3);
    job.source_path = ctx.temp_dir().join("missing").display().to_string();

    let result = builder(&ctx, Arc::new(MockExecutor::new())).build(&job);

    assert!(matches!(result, Err(BackupError::SourceNotFound(_))));
    assert!(ctx.list_dir(&ctx.temp_dir().join("scratch")).is_empty());
}

#[test]
fn test_embedded_database_dump_is_archived() {
    let ctx = TestContext::new();
    let db = create_sqlite_db(&ctx.temp_dir().join("shop.sqlite"));

    let mut job = sample_job(4);
    job.name = "shop".to_string();
    job.source_kind = SourceKind::Database;
    job.source_path = db.display().to_string();

    let executor = Arc::new(MockExecutor::new());
    let artifact = builder(&ctx, executor.clone()).build(&job).unwrap();

    let target = ctx.temp_dir().join("restore");
    extract(&artifact, &target).unwrap();

    let dump_name = list_entries(&artifact).unwrap().remove(0);
    let dump = std::fs::read_to_string(target.join(dump_name)).unwrap();
    assert!(dump.contains("CREATE TABLE customers"));
    assert!(dump.contains("'O''Brien'"));
    assert!(!executor.was_called("mysqldump"));
}

#[test]
fn test_server_database_uses_dump_tool() {
    let ctx = TestContext::new();
    let executor = Arc::new(MockExecutor::new().expect(
        "mysqldump",
        MockResponse::stdout("CREATE TABLE orders (id INT);\n"),
    ));

    let mut job = sample_job(5);
    job.name = "orders".to_string();
    job.source_kind = SourceKind::Database;
    job.source_path = "db.internal:3306:shop:backup:hunter2".to_string();

    let artifact = builder(&ctx, executor.clone()).build(&job).unwrap();
    assert!(artifact.exists());

    let calls = executor.get_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].args.contains(&"--single-transaction".to_string()));
    assert!(calls[0].args.contains(&"shop".to_string()));
}

#[test]
fn test_dump_failure_is_reported() {
    let ctx = TestContext::new();
    let executor = Arc::new(MockExecutor::new().expect(
        "mysqldump",
        MockResponse::failure("Access denied for user 'backup'"),
    ));

    let mut job = sample_job(6);
    job.source_kind = SourceKind::Database;
    job.source_path = "db.internal:3306:shop:backup:wrong".to_string();

    let result = builder(&ctx, executor).build(&job);
    assert!(matches!(result, Err(BackupError::DumpTool(_))));
    assert!(ctx.list_dir(&ctx.temp_dir().join("scratch")).is_empty());
}

#[rstest]
#[case("site", "site_20260301_020000_123.tar.gz.enc", true)]
#[case("site", "site_20260301_020000_123.tar", true)]
#[case("site", "site-old_20260301_020000_123.tar", false)]
#[case("site", "website_20260301_020000_123.tar", false)]
#[case("site", "site_latest.tar.gz", false)]
#[case("site", "notes.txt", false)]
fn test_job_artifact_names(#[case] job: &str, #[case] file: &str, #[case] expected: bool) {
    assert_eq!(is_job_artifact(job, file), expected);
}
