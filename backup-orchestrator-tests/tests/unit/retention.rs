//! Unit tests for retention pruning against a real local destination

use backup_orchestrator::destinations::{DestinationAdapter, LocalAdapter};
use backup_orchestrator::managers::retention::RetentionManager;
use test_utils::{create_aged_artifact, sample_job, Destination, TestContext};

fn job_in(ctx: &TestContext, name: &str, retention_days: u32) -> test_utils::BackupJob {
    let mut job = sample_job(1);
    job.name = name.to_string();
    job.retention_days = retention_days;
    job.destination = Destination::Local {
        path: ctx.create_subdir("backups"),
    };
    job
}

#[test]
fn test_prunes_only_expired_artifacts() {
    let ctx = TestContext::new();
    let job = job_in(&ctx, "site", 7);
    let dir = ctx.backup_dir();

    let old = create_aged_artifact(&dir, "site", 10);
    let fresh = create_aged_artifact(&dir, "site", 2);

    let report = RetentionManager::new().prune(&job, &LocalAdapter::new());

    assert_eq!(report.deleted.len(), 1);
    assert!(!old.exists());
    assert!(fresh.exists());
}

#[test]
fn test_other_jobs_artifacts_untouched() {
    let ctx = TestContext::new();
    let job = job_in(&ctx, "site", 7);
    let dir = ctx.backup_dir();

    let foreign = create_aged_artifact(&dir, "website", 30);
    let unrelated = ctx.create_file("backups/site-notes.txt", "keep");

    let report = RetentionManager::new().prune(&job, &LocalAdapter::new());

    assert!(report.deleted.is_empty());
    assert!(foreign.exists());
    assert!(unrelated.exists());
}

#[test]
fn test_zero_retention_keeps_everything() {
    let ctx = TestContext::new();
    let job = job_in(&ctx, "site", 0);
    let ancient = create_aged_artifact(&ctx.backup_dir(), "site", 400);

    let report = RetentionManager::new().prune(&job, &LocalAdapter::new());

    assert!(report.deleted.is_empty());
    assert!(ancient.exists());
}

#[test]
fn test_missing_destination_directory_is_not_an_error() {
    let ctx = TestContext::new();
    let mut job = job_in(&ctx, "site", 7);
    job.destination = Destination::Local {
        path: ctx.temp_dir().join("never-created"),
    };

    let listing = LocalAdapter::new().list_artifacts(&job.destination);
    let report = RetentionManager::new().prune(&job, &LocalAdapter::new());

    assert!(listing.unwrap().is_empty());
    assert!(report.deleted.is_empty() && report.failed.is_empty());
}
