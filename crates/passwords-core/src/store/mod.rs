//! Secret store backends
//!
//! This module provides two client seams and their implementations:
//! 1. Vault-style stores that decrypt server-side (HTTP KV v2, in-memory)
//! 2. Encrypted data bag files keyed by a local shared secret

mod encrypted_file;
mod item;
mod memory;
mod traits;
mod vault_http;

pub use encrypted_file::EncryptedFileStore;
pub use item::SecretItem;
pub use memory::MemoryVault;
pub use traits::{FileSecretClient, VaultClient};
pub use vault_http::{HttpVaultClient, HttpVaultConfig, DEFAULT_MOUNT, DEFAULT_TIMEOUT};
