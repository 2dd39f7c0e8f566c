//! Retention - prunes expired artifacts at a job's destination

use crate::archive::is_job_artifact;
use crate::destinations::DestinationAdapter;
use crate::error::BackupError;
use crate::jobs::BackupJob;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Outcome of one prune pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RetentionManager;

impl RetentionManager {
    pub fn new() -> Self {
        Self
    }

    /// Delete the job's artifacts older than `retention_days`.
    ///
    /// Never fails: listing and deletion errors are logged and reported.
    pub fn prune(&self, job: &BackupJob, adapter: &dyn DestinationAdapter) -> PruneReport {
        self.prune_at(job, adapter, Utc::now())
    }

    pub fn prune_at(&self, job: &BackupJob, adapter: &dyn DestinationAdapter, now: DateTime<Utc>) -> PruneReport {
        let mut report = PruneReport::default();
        if job.retention_days == 0 {
            debug!("Retention disabled for job '{}'", job.name);
            return report;
        }

        let cutoff = now - Duration::days(i64::from(job.retention_days));

        let artifacts = match adapter.list_artifacts(&job.destination) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!("{}", BackupError::RetentionPrune(format!("listing for job '{}': {}", job.name, e)));
                return report;
            }
        };

        for artifact in artifacts {
            if !is_job_artifact(&job.name, &artifact.name) || artifact.last_modified >= cutoff {
                continue;
            }

            match adapter.delete_artifact(&job.destination, &artifact.name) {
                Ok(()) => report.deleted.push(artifact.name),
                Err(e) => {
                    warn!("Failed to prune {}: {}", artifact.name, e);
                    report.failed.push(artifact.name);
                }
            }
        }

        if !report.deleted.is_empty() {
            info!(
                "Pruned {} artifact(s) older than {} days for job '{}'",
                report.deleted.len(),
                job.retention_days,
                job.name
            );
        }
        report
    }
}
