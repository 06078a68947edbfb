//! In-process vault backend

use async_trait::async_trait;
use std::collections::HashMap;

use super::{SecretItem, VaultClient};
use crate::error::{Result, SecretsError};

/// Vault backend holding items in memory
///
/// Useful when the host already has the decrypted items at hand, and in tests.
#[derive(Debug, Default)]
pub struct MemoryVault {
    items: HashMap<(String, String), SecretItem>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an item
    pub fn with_item<I, K, V>(mut self, container: &str, item: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.items.insert(
            (container.to_string(), item.to_string()),
            pairs.into_iter().collect(),
        );
        self
    }
}

#[async_trait]
impl VaultClient for MemoryVault {
    async fn load(&self, container: &str, item: &str) -> Result<SecretItem> {
        self.items
            .get(&(container.to_string(), item.to_string()))
            .cloned()
            .ok_or_else(|| SecretsError::ItemNotFound(format!("{}/{}", container, item)))
    }

    fn backend_name(&self) -> &'static str {
        "In-Memory Vault"
    }
}
