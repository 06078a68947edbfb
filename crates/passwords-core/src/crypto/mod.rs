//! Cryptographic primitives for encrypted data bag items
//!
//! This module provides:
//! - AES-256-GCM value envelopes (format version 3)
//! - SHA-256 key derivation from the shared secret
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{
    decrypt_value, encrypt_value, EncryptedValue, ENVELOPE_CIPHER, ENVELOPE_VERSION,
};
pub use key_derivation::derive_key;
pub use secure_memory::{DataBagKey, DataBagSecret};
