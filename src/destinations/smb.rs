//! SMB destination, driven through the `smbclient` utility
//!
//! The password travels in the `PASSWD` environment variable so it never
//! shows up in the process list.

use super::{artifact_file_name, wrong_destination, DestinationAdapter};
use crate::error::{BackupError, Result};
use crate::jobs::{Destination, DestinationKind, RemoteEndpoint};
use crate::utils::executor::CommandExecutor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_PORT: u16 = 445;

pub struct SmbAdapter {
    executor: Arc<dyn CommandExecutor>,
    client: String,
    timeout: Duration,
}

impl SmbAdapter {
    pub fn new(executor: Arc<dyn CommandExecutor>, client: impl Into<String>, timeout: Duration) -> Self {
        Self {
            executor,
            client: client.into(),
            timeout,
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', ""))
}

/// `//host/share` plus the command script for `smbclient -c`
fn upload_script(endpoint: &RemoteEndpoint, local: &Path, name: &str) -> Result<(String, String)> {
    let segments = endpoint.path_segments();
    let Some((share, dirs)) = segments.split_first() else {
        return Err(BackupError::TransferFailed(
            "smb remote_path must start with the share name".to_string(),
        ));
    };

    let mut script = String::new();
    for dir in dirs {
        script.push_str(&format!("mkdir {}; cd {}; ", quote(dir), quote(dir)));
    }
    script.push_str(&format!(
        "put {} {}",
        quote(&local.to_string_lossy()),
        quote(name)
    ));

    Ok((format!("//{}/{}", endpoint.host, share), script))
}

impl DestinationAdapter for SmbAdapter {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Smb
    }

    fn upload(&self, artifact: &Path, destination: &Destination) -> Result<()> {
        let Destination::Smb(endpoint) = destination else {
            return Err(wrong_destination(DestinationKind::Smb, destination));
        };

        let name = artifact_file_name(artifact)?;
        let (service, script) = upload_script(endpoint, artifact, &name)?;
        let port = endpoint.port_or(DEFAULT_PORT).to_string();

        let output = self
            .executor
            .run_command(
                &self.client,
                &[&service, "-p", &port, "-U", &endpoint.user, "-c", &script],
                &[("PASSWD", endpoint.password.as_str())],
                None,
                Some(self.timeout),
            )
            .map_err(|e| BackupError::TransferFailed(format!("smb {}: {:#}", service, e)))?;

        // smbclient reports some failures with a zero exit code
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if let Some(line) = text
            .lines()
            .find(|l| l.contains("NT_STATUS_") && !l.contains("NT_STATUS_OBJECT_NAME_COLLISION"))
        {
            return Err(BackupError::TransferFailed(format!("smb {}: {}", service, line.trim())));
        }

        info!("Artifact uploaded to smb:{}/{}", service, endpoint.remote_path);
        Ok(())
    }
}
