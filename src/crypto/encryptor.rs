//! Authenticated encryption of backup artifacts
//!
//! Envelope layout: `MAGIC || nonce (19 bytes) || segments`. The payload is cut
//! into 64 KiB segments sealed with XChaCha20-Poly1305 in the STREAM construction
//! (big-endian 32-bit counter plus a last-segment flag), so artifacts of any size
//! are processed with a fixed amount of memory. A wrong key, a modified byte, or
//! reordered, dropped or appended segments all fail the tag check.

use super::keystore::EncryptionKey;
use crate::error::{BackupError, Result};
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::stream::{DecryptorBE32, EncryptorBE32};
use chacha20poly1305::aead::KeyInit;
use chacha20poly1305::{Key, XChaCha20Poly1305};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MAGIC: &[u8; 6] = b"BKENC1";
/// XChaCha20 nonce minus the 5 bytes STREAM reserves for counter and flag
const NONCE_LEN: usize = 19;
const SEGMENT_LEN: usize = 64 * 1024;
const TAG_LEN: usize = 16;

/// Filename suffix appended to encrypted artifacts
pub const ENCRYPTED_SUFFIX: &str = ".enc";

#[derive(Debug, Default, Clone, Copy)]
pub struct Encryptor;

impl Encryptor {
    pub fn new() -> Self {
        Self
    }

    pub fn encrypt(&self, plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(plaintext.len() + MAGIC.len() + NONCE_LEN + TAG_LEN);
        self.encrypt_stream(&mut &plaintext[..], &mut out, key)?;
        Ok(out)
    }

    pub fn decrypt(&self, envelope: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(envelope.len());
        self.decrypt_stream(&mut &envelope[..], &mut out, key)?;
        Ok(out)
    }

    /// Seal everything `reader` yields into `writer`.
    ///
    /// The last segment is always shorter than [`SEGMENT_LEN`], possibly empty, so
    /// a full-length segment is never the final one.
    pub fn encrypt_stream<R: Read, W: Write>(&self, reader: &mut R, writer: &mut W, key: &EncryptionKey) -> Result<()> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let mut stream = EncryptorBE32::from_aead(cipher, GenericArray::from_slice(&nonce));

        writer.write_all(MAGIC)?;
        writer.write_all(&nonce)?;

        let mut segment = vec![0u8; SEGMENT_LEN];
        loop {
            let n = read_full(reader, &mut segment)?;
            if n < SEGMENT_LEN {
                let sealed = stream
                    .encrypt_last(&segment[..n])
                    .map_err(|e| BackupError::EncryptionFailed(e.to_string()))?;
                writer.write_all(&sealed)?;
                break;
            }
            let sealed = stream
                .encrypt_next(&segment[..])
                .map_err(|e| BackupError::EncryptionFailed(e.to_string()))?;
            writer.write_all(&sealed)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Inverse of [`Encryptor::encrypt_stream`]. Plaintext reaches `writer` one
    /// verified segment at a time; callers that must not keep partial output on
    /// failure write to a temporary location.
    pub fn decrypt_stream<R: Read, W: Write>(&self, reader: &mut R, writer: &mut W, key: &EncryptionKey) -> Result<()> {
        let mut header = [0u8; MAGIC.len() + NONCE_LEN];
        if read_full(reader, &mut header)? < header.len() || &header[..MAGIC.len()] != MAGIC {
            return Err(BackupError::IntegrityCheckFailed(
                "encryption header missing or invalid".to_string(),
            ));
        }

        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        let mut stream = DecryptorBE32::from_aead(cipher, GenericArray::from_slice(&header[MAGIC.len()..]));

        let tag_mismatch = || {
            BackupError::IntegrityCheckFailed(
                "authentication tag mismatch (wrong key or corrupted artifact)".to_string(),
            )
        };

        let mut segment = vec![0u8; SEGMENT_LEN + TAG_LEN];
        loop {
            let n = read_full(reader, &mut segment)?;
            if n < segment.len() {
                let plain = stream.decrypt_last(&segment[..n]).map_err(|_| tag_mismatch())?;
                writer.write_all(&plain)?;
                break;
            }
            let plain = stream.decrypt_next(&segment[..]).map_err(|_| tag_mismatch())?;
            writer.write_all(&plain)?;
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(BackupError::IntegrityCheckFailed(
                "unexpected data after final segment".to_string(),
            ));
        }

        writer.flush()?;
        Ok(())
    }

    /// Encrypt `plain` into `<plain>.enc`. The plaintext file is left in place.
    pub fn encrypt_file(&self, plain: &Path, key: &EncryptionKey) -> Result<PathBuf> {
        let mut encrypted = plain.as_os_str().to_os_string();
        encrypted.push(ENCRYPTED_SUFFIX);
        let encrypted = PathBuf::from(encrypted);

        let mut reader = BufReader::new(File::open(plain)?);
        let result = File::create(&encrypted)
            .map_err(BackupError::from)
            .and_then(|file| self.encrypt_stream(&mut reader, &mut BufWriter::new(file), key));

        if let Err(e) = result {
            discard(&encrypted);
            return Err(e);
        }
        info!("File encrypted: {:?}", encrypted);
        Ok(encrypted)
    }

    /// Decrypt `encrypted` into `output`; nothing is left at `output` when any
    /// segment fails its tag check
    pub fn decrypt_file(&self, encrypted: &Path, key: &EncryptionKey, output: &Path) -> Result<()> {
        let mut partial = output.as_os_str().to_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let mut reader = BufReader::new(File::open(encrypted)?);
        let result = File::create(&partial)
            .map_err(BackupError::from)
            .and_then(|file| self.decrypt_stream(&mut reader, &mut BufWriter::new(file), key))
            .and_then(|()| fs::rename(&partial, output).map_err(BackupError::from));

        if let Err(e) = result {
            discard(&partial);
            return Err(e);
        }
        info!("File decrypted: {:?}", output);
        Ok(())
    }
}

/// Read until `buf` is full or the reader is exhausted
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove incomplete file {:?}: {}", path, e);
        }
    }
}

/// Strip the `.enc` suffix, if present
pub fn plain_name(encrypted: &Path) -> Option<PathBuf> {
    let name = encrypted.file_name()?.to_str()?;
    name.strip_suffix(ENCRYPTED_SUFFIX)
        .filter(|stem| !stem.is_empty())
        .map(|stem| encrypted.with_file_name(stem))
}
