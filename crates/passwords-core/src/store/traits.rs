//! Secret store client trait definitions

use async_trait::async_trait;
use std::path::Path;

use super::SecretItem;
use crate::crypto::DataBagSecret;
use crate::error::Result;

/// Client for a vault-style store that handles decryption itself
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Load an item from a container
    async fn load(&self, container: &str, item: &str) -> Result<SecretItem>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}

/// Client for items encrypted with a locally held shared secret
#[async_trait]
pub trait FileSecretClient: Send + Sync {
    /// Load and decrypt an item from a container
    ///
    /// Fails with [`SecretsError::NoSecret`](crate::SecretsError::NoSecret)
    /// when `secret` is `None`.
    async fn load(
        &self,
        container: &str,
        item: &str,
        secret: Option<&DataBagSecret>,
    ) -> Result<SecretItem>;

    /// Read a shared secret from a key file
    async fn load_secret(&self, path: &Path) -> Result<DataBagSecret>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}
