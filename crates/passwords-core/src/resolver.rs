//! Credential resolution with default fallback
//!
//! Every lookup is a single attempt against the configured backend. Errors
//! the store raises about the request itself are returned to the caller;
//! any other failure, or a key missing from the item, yields the default.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{BackendMode, ItemPurpose, ResolverConfig};
use crate::error::{Result, SecretsError};
use crate::store::{FileSecretClient, SecretItem, VaultClient};

/// Backend chosen once, when the resolver is built
enum SecretBackend {
    Vault(Arc<dyn VaultClient>),
    FileSecret {
        client: Arc<dyn FileSecretClient>,
        /// Secret file picked from the configuration, if any
        secret_file: Option<PathBuf>,
    },
}

/// Resolves database passwords from the secret store
pub struct CredentialResolver {
    config: ResolverConfig,
    backend: SecretBackend,
}

impl CredentialResolver {
    /// Create a resolver, selecting the client named by `config.backend_mode`
    pub fn new(
        config: ResolverConfig,
        vault: Arc<dyn VaultClient>,
        files: Arc<dyn FileSecretClient>,
    ) -> Self {
        match config.backend_mode {
            BackendMode::Vault => Self::with_vault(config, vault),
            BackendMode::FileSecret => Self::with_file_secrets(config, files),
        }
    }

    /// Create a resolver reading from a vault client
    pub fn with_vault(config: ResolverConfig, client: Arc<dyn VaultClient>) -> Self {
        debug!(backend = client.backend_name(), "Credential resolver using vault");
        Self {
            config,
            backend: SecretBackend::Vault(client),
        }
    }

    /// Create a resolver reading encrypted files
    pub fn with_file_secrets(config: ResolverConfig, client: Arc<dyn FileSecretClient>) -> Self {
        let secret_file = config.resolve_secret_file();
        debug!(
            backend = client.backend_name(),
            secret_file = ?secret_file,
            "Credential resolver using encrypted files"
        );
        Self {
            config,
            backend: SecretBackend::FileSecret {
                client,
                secret_file,
            },
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Get the active backend mode
    pub fn backend_mode(&self) -> BackendMode {
        match self.backend {
            SecretBackend::Vault(_) => BackendMode::Vault,
            SecretBackend::FileSecret { .. } => BackendMode::FileSecret,
        }
    }

    /// Fetch one item from the active backend
    async fn fetch(&self, item_id: &str) -> Result<SecretItem> {
        let container = self.config.container.as_str();

        match &self.backend {
            SecretBackend::Vault(client) => client.load(container, item_id).await,
            SecretBackend::FileSecret {
                client,
                secret_file,
            } => {
                let secret = match secret_file {
                    Some(path) => Some(client.load_secret(path).await?),
                    None => None,
                };
                client.load(container, item_id, secret.as_ref()).await
            }
        }
    }

    /// Resolve `key` from item `item_id`, falling back to `default`
    ///
    /// Returns `Ok(None)` when neither the item nor the default has a value.
    pub async fn resolve(
        &self,
        item_id: &str,
        key: &str,
        default: Option<&str>,
    ) -> Result<Option<String>> {
        let container = self.config.container.as_str();

        if item_id.is_empty() {
            warn!(container, key, "Refusing to resolve password from an unnamed item");
            return Err(SecretsError::ValidationFailed {
                container: container.to_string(),
                item: item_id.to_string(),
                reason: "item identifier is empty".to_string(),
            });
        }

        match self.fetch(item_id).await {
            Ok(item) => match (item.get(key), item.unreadable_reason(key)) {
                (Some(value), _) => {
                    debug!(container, item = item_id, key, "Resolved password from store");
                    Ok(Some(value.to_string()))
                }
                (None, Some(reason)) => {
                    info!(
                        container,
                        item = item_id,
                        key,
                        default_set = default.is_some(),
                        error = reason,
                        "Unable to read password, falling back to default"
                    );
                    Ok(default.map(str::to_string))
                }
                (None, None) => {
                    info!(
                        container,
                        item = item_id,
                        key,
                        default_set = default.is_some(),
                        "No value for key in item, falling back to default"
                    );
                    Ok(default.map(str::to_string))
                }
            },
            Err(e) if e.is_validation() => {
                warn!(container, item = item_id, key, error = %e, "Secret store rejected request");
                Err(SecretsError::ValidationFailed {
                    container: container.to_string(),
                    item: item_id.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                info!(
                    container,
                    item = item_id,
                    key,
                    default_set = default.is_some(),
                    error = %e,
                    "Unable to load password, falling back to default"
                );
                Ok(default.map(str::to_string))
            }
        }
    }

    /// Resolve `key` from the item configured for `purpose`
    pub async fn resolve_for(
        &self,
        purpose: ItemPurpose,
        key: &str,
        default: Option<&str>,
    ) -> Result<Option<String>> {
        self.resolve(self.config.items.get(purpose), key, default).await
    }

    /// Database root password
    pub async fn root_password(&self) -> Result<Option<String>> {
        let defaults = &self.config.defaults;
        self.resolve_for(ItemPurpose::Mysql, "root", defaults.root.as_deref()).await
    }

    /// `old_passwords` server setting
    pub async fn old_passwords(&self) -> Result<Option<String>> {
        let defaults = &self.config.defaults;
        self.resolve_for(ItemPurpose::Mysql, "old_passwords", defaults.old_passwords.as_deref())
            .await
    }

    /// Password of the replication user
    pub async fn replication_password(&self) -> Result<Option<String>> {
        let defaults = &self.config.defaults;
        self.resolve_for(ItemPurpose::Mysql, "replication", defaults.replication.as_deref())
            .await
    }

    /// Password of the backup user, stored under the backup user's name
    pub async fn backup_password(&self) -> Result<Option<String>> {
        let defaults = &self.config.defaults;
        self.resolve_for(
            ItemPurpose::Mysql,
            &defaults.backup_username,
            defaults.backup.as_deref(),
        )
        .await
    }

    /// Password of the distribution maintenance user
    ///
    /// Not managed through the secret store; always `None`.
    pub fn debian_password(&self) -> Option<String> {
        None
    }
}
