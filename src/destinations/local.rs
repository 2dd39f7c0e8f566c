//! Local filesystem destination

use super::{artifact_file_name, wrong_destination, DestinationAdapter, RemoteArtifact};
use crate::error::{BackupError, Result};
use crate::jobs::{Destination, DestinationKind};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Default, Clone)]
pub struct LocalAdapter;

impl LocalAdapter {
    pub fn new() -> Self {
        Self
    }

    fn directory<'a>(&self, destination: &'a Destination) -> Result<&'a PathBuf> {
        match destination {
            Destination::Local { path } => Ok(path),
            other => Err(wrong_destination(DestinationKind::Local, other)),
        }
    }
}

/// Rename, falling back to copy + remove when crossing filesystems
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Rename failed ({}), copying {:?} to {:?}", e, from, to);
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

impl DestinationAdapter for LocalAdapter {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Local
    }

    fn upload(&self, artifact: &Path, destination: &Destination) -> Result<()> {
        let dir = self.directory(destination)?;
        let target = dir.join(artifact_file_name(artifact)?);

        let transfer = |e: io::Error| BackupError::TransferFailed(format!("{:?}: {}", target, e));

        fs::create_dir_all(dir).map_err(transfer)?;
        move_file(artifact, &target).map_err(transfer)?;

        if !target.is_file() {
            return Err(BackupError::TransferFailed(format!(
                "{:?} missing after move",
                target
            )));
        }

        info!("Artifact stored at {:?}", target);
        Ok(())
    }

    fn list_artifacts(&self, destination: &Destination) -> Result<Vec<RemoteArtifact>> {
        let dir = self.directory(destination)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            artifacts.push(RemoteArtifact {
                name,
                last_modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }

        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }

    fn delete_artifact(&self, destination: &Destination, name: &str) -> Result<()> {
        let dir = self.directory(destination)?;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(BackupError::RetentionPrune(format!("refusing to delete {:?}", name)));
        }

        let path = dir.join(name);
        fs::remove_file(&path)
            .map_err(|e| BackupError::RetentionPrune(format!("{:?}: {}", path, e)))?;
        info!("Deleted expired artifact {:?}", path);
        Ok(())
    }
}
