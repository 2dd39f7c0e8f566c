//! Persistent symmetric key material

use crate::error::{BackupError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;

/// 256-bit key, wiped from memory on drop
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut *bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Owns the key file. The key is created once and never rotated automatically.
#[derive(Debug, Clone)]
pub struct KeyStore {
    key_file: PathBuf,
}

impl KeyStore {
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: key_file.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.key_file
    }

    /// Read the key, creating it on first use
    pub fn get_or_create_key(&self) -> Result<EncryptionKey> {
        let result = if self.key_file.exists() {
            self.read_key()
        } else {
            self.create_key()
        };

        if let Err(ref e) = result {
            error!("Encryption key handling failed: {}", e);
        }
        result
    }

    /// Read an existing key without creating one (restore path)
    pub fn read_key(&self) -> Result<EncryptionKey> {
        let data = Zeroizing::new(fs::read(&self.key_file).map_err(|e| {
            BackupError::KeyUnavailable(format!("cannot read {:?}: {}", self.key_file, e))
        })?);

        let bytes: [u8; KEY_LEN] = data.as_slice().try_into().map_err(|_| {
            BackupError::KeyUnavailable(format!(
                "{:?} holds {} bytes, expected {}",
                self.key_file,
                data.len(),
                KEY_LEN
            ))
        })?;

        Ok(EncryptionKey::from_bytes(bytes))
    }

    fn create_key(&self) -> Result<EncryptionKey> {
        let unavailable =
            |e: std::io::Error| BackupError::KeyUnavailable(format!("cannot create {:?}: {}", self.key_file, e));

        if let Some(parent) = self.key_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(unavailable)?;
            }
        }

        let key = EncryptionKey::generate();

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.key_file).map_err(unavailable)?;
        file.write_all(key.as_bytes()).map_err(unavailable)?;
        file.sync_all().map_err(unavailable)?;

        info!("New encryption key generated: {:?}", self.key_file);
        Ok(key)
    }
}
