//! # passwords-core
//!
//! Database credential resolution for host automation:
//! - Vault-backed or encrypted data bag backed secret items
//! - AES-256-GCM item encryption keyed by a shared secret file
//! - Default fallback whenever the store cannot supply a value

pub mod config;
pub mod crypto;
pub mod error;
pub mod store;
mod resolver;

pub use config::{
    BackendMode, HostAttributes, ItemPurpose, ItemRefs, PasswordDefaults, ResolverConfig,
};
pub use crypto::{DataBagKey, DataBagSecret};
pub use error::{Result, SecretsError};
pub use resolver::CredentialResolver;
pub use store::{
    EncryptedFileStore, FileSecretClient, HttpVaultClient, HttpVaultConfig, MemoryVault, SecretItem,
    VaultClient,
};
