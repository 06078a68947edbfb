//! Encrypted data bag file backend
//!
//! Items live at `<root>/<container>/<item>.json`. Each file is a JSON
//! object with a plaintext `id` and one encrypted envelope per secret key.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use super::item::scalar_to_string;
use super::{FileSecretClient, SecretItem};
use crate::crypto::{
    decrypt_value, derive_key, encrypt_value, DataBagKey, DataBagSecret, EncryptedValue,
};
use crate::error::{Result, SecretsError};

/// Field holding the item identifier, stored unencrypted
const ID_FIELD: &str = "id";

fn container_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-A-Za-z0-9_]+$").expect("valid container pattern"))
}

fn item_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-.A-Za-z0-9_]+$").expect("valid item pattern"))
}

/// Encrypted data bag directory backend
pub struct EncryptedFileStore {
    /// Directory holding one sub-directory per container
    root: PathBuf,
}

impl EncryptedFileStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!("Encrypted file store rooted at: {:?}", root);
        Self { root }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path of an item file
    pub fn item_path(&self, container: &str, item: &str) -> PathBuf {
        self.root.join(container).join(format!("{}.json", item))
    }

    /// Reject names that cannot address an item file
    fn validate_names(container: &str, item: &str) -> Result<()> {
        if !container_pattern().is_match(container) {
            return Err(SecretsError::InvalidItem(format!(
                "container name '{}' must match {}",
                container,
                container_pattern().as_str()
            )));
        }
        // `.` and `..` match the item pattern but would escape the container
        if !item_pattern().is_match(item) || item.chars().all(|c| c == '.') {
            return Err(SecretsError::InvalidItem(format!(
                "item name '{}' must match {}",
                item,
                item_pattern().as_str()
            )));
        }
        Ok(())
    }

    /// Encrypt `values` and write them as an item file
    ///
    /// An existing item is replaced. Returns the path written.
    pub async fn seal(
        &self,
        container: &str,
        item: &str,
        values: &SecretItem,
        secret: &DataBagSecret,
    ) -> Result<PathBuf> {
        Self::validate_names(container, item)?;
        if values.contains_key(ID_FIELD) {
            return Err(SecretsError::InvalidItem(format!(
                "'{}' is reserved for the item identifier",
                ID_FIELD
            )));
        }

        let key = derive_key(secret);

        let mut object = serde_json::Map::new();
        object.insert(ID_FIELD.to_string(), serde_json::Value::String(item.to_string()));
        for name in values.keys() {
            let plaintext = values.get(name).unwrap_or_default();
            let envelope = encrypt_value(&serde_json::Value::String(plaintext.to_string()), &key)?;
            object.insert(name.to_string(), envelope.to_json()?);
        }

        let contents = serde_json::to_string_pretty(&serde_json::Value::Object(object))?;
        let path = self.item_path(container, item);

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        // Write atomically using a temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!(container, item, keys = values.len(), "Sealed item");
        Ok(path)
    }
}

/// Decrypt one field of an item file into its text value
fn decrypt_field(name: &str, raw: &serde_json::Value, key: &DataBagKey) -> Result<String> {
    let envelope = EncryptedValue::from_json(raw)?;
    let value = decrypt_value(&envelope, key)?;
    scalar_to_string(name, value)
}

#[async_trait]
impl FileSecretClient for EncryptedFileStore {
    async fn load(
        &self,
        container: &str,
        item: &str,
        secret: Option<&DataBagSecret>,
    ) -> Result<SecretItem> {
        Self::validate_names(container, item)?;
        let secret = secret.ok_or(SecretsError::NoSecret)?;

        let path = self.item_path(container, item);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Item file not found: {:?}", path);
                return Err(SecretsError::ItemNotFound(format!("{}/{}", container, item)));
            }
            Err(e) => return Err(e.into()),
        };

        let object = match serde_json::from_str::<serde_json::Value>(&contents)? {
            serde_json::Value::Object(object) => object,
            _ => {
                return Err(SecretsError::MalformedItem(format!(
                    "{}/{} is not a JSON object",
                    container, item
                )))
            }
        };

        match object.get(ID_FIELD).and_then(|id| id.as_str()) {
            Some(id) if id == item => {}
            Some(id) => {
                return Err(SecretsError::InvalidItem(format!(
                    "file for '{}' carries id '{}'",
                    item, id
                )))
            }
            None => {
                return Err(SecretsError::MalformedItem(format!(
                    "{}/{} has no '{}' field",
                    container, item, ID_FIELD
                )))
            }
        }

        let key = derive_key(secret);
        let mut decrypted = SecretItem::new();

        for (name, raw) in object {
            if name == ID_FIELD {
                continue;
            }
            match decrypt_field(&name, &raw, &key) {
                Ok(text) => decrypted.insert(name, text),
                Err(e) => {
                    debug!(container, item, key = %name, error = %e, "Unreadable item field");
                    decrypted.mark_unreadable(name, e.to_string());
                }
            }
        }

        debug!(container, item, keys = decrypted.len(), "Loaded encrypted item");
        Ok(decrypted)
    }

    async fn load_secret(&self, path: &Path) -> Result<DataBagSecret> {
        if !path.exists() {
            return Err(SecretsError::SecretFileNotFound(path.to_path_buf()));
        }

        let contents = tokio::fs::read_to_string(path).await?;

        DataBagSecret::new(&contents).ok_or_else(|| {
            SecretsError::DecryptionError(format!("secret file {:?} is empty", path))
        })
    }

    fn backend_name(&self) -> &'static str {
        "Encrypted Data Bag Files"
    }
}
