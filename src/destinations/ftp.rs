//! FTP destination

use super::{artifact_file_name, wrong_destination, DestinationAdapter};
use crate::error::{BackupError, Result};
use crate::jobs::{Destination, DestinationKind, RemoteEndpoint};
use std::fs::File;
use std::io::BufReader;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::{debug, info, warn};

const DEFAULT_PORT: u16 = 21;

#[derive(Debug, Clone)]
pub struct FtpAdapter {
    timeout: Duration,
}

impl FtpAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn connect(&self, endpoint: &RemoteEndpoint) -> Result<FtpStream> {
        let port = endpoint.port_or(DEFAULT_PORT);
        let addr = (endpoint.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| transfer(format!("cannot resolve {}:{}: {}", endpoint.host, port, e)))?
            .next()
            .ok_or_else(|| transfer(format!("no address for {}:{}", endpoint.host, port)))?;

        let ftp = FtpStream::connect_timeout(addr, self.timeout)
            .map_err(|e| transfer(format!("connect {}: {}", addr, e)))?;
        ftp.get_ref()
            .set_read_timeout(Some(self.timeout))
            .and_then(|()| ftp.get_ref().set_write_timeout(Some(self.timeout)))
            .map_err(|e| transfer(format!("socket timeout: {}", e)))?;
        Ok(ftp)
    }

    fn store(&self, ftp: &mut FtpStream, endpoint: &RemoteEndpoint, artifact: &Path) -> Result<()> {
        ftp.login(&endpoint.user, &endpoint.password)
            .map_err(|e| transfer(format!("login as {}: {}", endpoint.user, e)))?;
        ftp.transfer_type(FileType::Binary)
            .map_err(|e| transfer(format!("binary mode: {}", e)))?;

        for segment in endpoint.path_segments() {
            // An existing directory makes MKD fail; CWD decides
            if let Err(e) = ftp.mkdir(segment) {
                debug!("MKD {} ignored: {}", segment, e);
            }
            ftp.cwd(segment)
                .map_err(|e| transfer(format!("cannot enter {}: {}", segment, e)))?;
        }

        let name = artifact_file_name(artifact)?;
        let expected = std::fs::metadata(artifact)?.len();
        let mut reader = BufReader::new(File::open(artifact)?);

        let written = ftp
            .put_file(&name, &mut reader)
            .map_err(|e| transfer(format!("STOR {}: {}", name, e)))?;
        if written != expected {
            return Err(transfer(format!(
                "short write for {}: {} of {} bytes",
                name, written, expected
            )));
        }
        Ok(())
    }
}

fn transfer(msg: String) -> BackupError {
    BackupError::TransferFailed(format!("ftp {}", msg))
}

impl DestinationAdapter for FtpAdapter {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Ftp
    }

    fn upload(&self, artifact: &Path, destination: &Destination) -> Result<()> {
        let Destination::Ftp(endpoint) = destination else {
            return Err(wrong_destination(DestinationKind::Ftp, destination));
        };

        let mut ftp = self.connect(endpoint)?;
        let result = self.store(&mut ftp, endpoint, artifact);

        if let Err(e) = ftp.quit() {
            warn!("FTP QUIT failed: {}", e);
        }
        result?;

        info!(
            "Artifact uploaded to ftp://{}/{}",
            endpoint.host, endpoint.remote_path
        );
        Ok(())
    }
}
