//! Data bag key derivation
//!
//! The AES-256 key for an encrypted item is the SHA-256 digest of the
//! shared secret text.

use sha2::{Digest, Sha256};

use super::{DataBagKey, DataBagSecret};

/// Derive the 256-bit item key from a data bag secret
pub fn derive_key(secret: &DataBagSecret) -> DataBagKey {
    let digest = Sha256::digest(secret.expose().as_bytes());

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&digest);

    DataBagKey::new(key_bytes)
}
