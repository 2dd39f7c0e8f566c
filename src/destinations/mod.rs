//! Destination adapters
//!
//! One adapter per [`DestinationKind`]. A job's [`Destination`] variant selects
//! the adapter; adapters never guess the kind from path contents.
//!
//! `upload` returning `Ok(())` means the transfer was confirmed. On error the
//! artifact stays where it was and nothing is retried.

mod ftp;
mod local;
mod object_store;
mod smb;

pub use ftp::FtpAdapter;
pub use local::LocalAdapter;
pub use object_store::{ObjectStoreAdapter, ObjectStoreSettings};
pub use smb::SmbAdapter;

use crate::config::Config;
use crate::error::{BackupError, Result};
use crate::jobs::{Destination, DestinationKind};
use crate::utils::executor::CommandExecutor;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// An artifact stored at a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

pub trait DestinationAdapter: Send + Sync {
    fn kind(&self) -> DestinationKind;

    /// Transfer `artifact` to `destination`
    fn upload(&self, artifact: &Path, destination: &Destination) -> Result<()>;

    /// Artifacts present at the destination. An empty list means nothing to prune.
    fn list_artifacts(&self, _destination: &Destination) -> Result<Vec<RemoteArtifact>> {
        Ok(Vec::new())
    }

    fn delete_artifact(&self, _destination: &Destination, name: &str) -> Result<()> {
        Err(BackupError::RetentionPrune(format!(
            "{} destinations do not support deleting {}",
            self.kind(),
            name
        )))
    }
}

/// Adapters keyed by destination kind
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<DestinationKind, Arc<dyn DestinationAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four adapters, configured from `config`
    pub fn standard(config: &Config, executor: Arc<dyn CommandExecutor>) -> Self {
        let transfer_timeout = Duration::from_secs(config.global.transfer_timeout_seconds);

        Self::new()
            .register(Arc::new(LocalAdapter::new()))
            .register(Arc::new(FtpAdapter::new(transfer_timeout)))
            .register(Arc::new(SmbAdapter::new(
                executor,
                config.global.smb_client.clone(),
                transfer_timeout,
            )))
            .register(Arc::new(ObjectStoreAdapter::new(
                ObjectStoreSettings::from_config(&config.object_store),
                transfer_timeout,
            )))
    }

    /// Add or replace the adapter for its kind
    pub fn register(mut self, adapter: Arc<dyn DestinationAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn for_destination(&self, destination: &Destination) -> Result<Arc<dyn DestinationAdapter>> {
        let kind = destination.kind();
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or_else(|| BackupError::TransferFailed(format!("no adapter registered for {} destinations", kind)))
    }
}

fn artifact_file_name(artifact: &Path) -> Result<String> {
    artifact
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| BackupError::TransferFailed(format!("artifact has no file name: {:?}", artifact)))
}

fn wrong_destination(kind: DestinationKind, destination: &Destination) -> BackupError {
    BackupError::TransferFailed(format!(
        "{} adapter cannot handle {} destination",
        kind,
        destination.kind()
    ))
}

/// In-memory adapter for tests
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    #[derive(Clone)]
    pub struct MockAdapter {
        kind: DestinationKind,
        fail_uploads: Option<String>,
        /// Paths passed to `upload`
        pub uploads: Arc<Mutex<Vec<PathBuf>>>,
        /// Listing returned by `list_artifacts`
        pub listing: Arc<Mutex<Vec<RemoteArtifact>>>,
        /// Names passed to `delete_artifact`
        pub deleted: Arc<Mutex<Vec<String>>>,
        fail_deletes: bool,
        upload_delay: Option<Duration>,
    }

    impl MockAdapter {
        pub fn new(kind: DestinationKind) -> Self {
            Self {
                kind,
                fail_uploads: None,
                uploads: Arc::default(),
                listing: Arc::default(),
                deleted: Arc::default(),
                fail_deletes: false,
                upload_delay: None,
            }
        }

        pub fn failing(kind: DestinationKind, reason: &str) -> Self {
            Self {
                fail_uploads: Some(reason.to_string()),
                ..Self::new(kind)
            }
        }

        pub fn with_listing(self, artifacts: Vec<RemoteArtifact>) -> Self {
            *self.listing.lock() = artifacts;
            self
        }

        pub fn with_failing_deletes(mut self) -> Self {
            self.fail_deletes = true;
            self
        }

        /// Hold every upload for `delay`, simulating a slow transfer
        pub fn with_upload_delay(mut self, delay: Duration) -> Self {
            self.upload_delay = Some(delay);
            self
        }

        pub fn upload_count(&self) -> usize {
            self.uploads.lock().len()
        }
    }

    impl DestinationAdapter for MockAdapter {
        fn kind(&self) -> DestinationKind {
            self.kind
        }

        fn upload(&self, artifact: &Path, _destination: &Destination) -> Result<()> {
            if let Some(delay) = self.upload_delay {
                std::thread::sleep(delay);
            }
            if let Some(reason) = &self.fail_uploads {
                return Err(BackupError::TransferFailed(reason.clone()));
            }
            self.uploads.lock().push(artifact.to_path_buf());
            Ok(())
        }

        fn list_artifacts(&self, _destination: &Destination) -> Result<Vec<RemoteArtifact>> {
            Ok(self.listing.lock().clone())
        }

        fn delete_artifact(&self, _destination: &Destination, name: &str) -> Result<()> {
            if self.fail_deletes {
                return Err(BackupError::RetentionPrune(format!("cannot delete {}", name)));
            }
            self.deleted.lock().push(name.to_string());
            self.listing.lock().retain(|a| a.name != name);
            Ok(())
        }
    }
}
