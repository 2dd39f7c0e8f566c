//! Key management and artifact encryption

mod encryptor;
mod keystore;

pub use encryptor::{plain_name, Encryptor, ENCRYPTED_SUFFIX};
pub use keystore::{EncryptionKey, KeyStore, KEY_LEN};
