//! Resolver configuration
//!
//! Host attributes are read from a JSON document (camelCase keys, every key
//! optional) and turned into an immutable [`ResolverConfig`].

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{json_kind, Result, SecretsError};

/// Container used when the host does not name one
pub const DEFAULT_CONTAINER: &str = "passwords";

/// Item holding the database passwords by default
pub const DEFAULT_MYSQL_ITEM: &str = "mysql";

/// Item holding system-level secrets by default
pub const DEFAULT_SYSTEM_ITEM: &str = "system";

/// Backup user name by default; also the key of its password
pub const DEFAULT_BACKUP_USERNAME: &str = "backup";

/// Accept strings, numbers and booleans for default values
fn optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar default, found {}",
            json_kind(&other)
        ))),
    }
}

/// Replication defaults (`serverDefaults.replication`)
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplicationDefaults {
    #[serde(deserialize_with = "optional_scalar")]
    pub password: Option<String>,
}

/// Server defaults (`serverDefaults`)
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerDefaults {
    #[serde(deserialize_with = "optional_scalar")]
    pub root_password: Option<String>,
    #[serde(deserialize_with = "optional_scalar")]
    pub old_passwords: Option<String>,
    pub replication: ReplicationDefaults,
}

/// Raw host attributes as supplied by the automation framework
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostAttributes {
    /// Read items from the vault instead of encrypted files
    pub use_vault: bool,
    /// Container (data bag) name
    pub container: String,
    /// Per-node secret file; an empty string means unset
    pub encrypted_secret_file_path: Option<PathBuf>,
    /// Fallback secret file used when the per-node one is unusable
    pub default_secret_file: Option<PathBuf>,
    pub mysql_item_id: String,
    pub system_item_id: String,
    pub server_defaults: ServerDefaults,
    pub backup_username: String,
    #[serde(deserialize_with = "optional_scalar")]
    pub backup_password: Option<String>,
}

impl Default for HostAttributes {
    fn default() -> Self {
        Self {
            use_vault: false,
            container: DEFAULT_CONTAINER.to_string(),
            encrypted_secret_file_path: None,
            default_secret_file: None,
            mysql_item_id: DEFAULT_MYSQL_ITEM.to_string(),
            system_item_id: DEFAULT_SYSTEM_ITEM.to_string(),
            server_defaults: ServerDefaults::default(),
            backup_username: DEFAULT_BACKUP_USERNAME.to_string(),
            backup_password: None,
        }
    }
}

impl HostAttributes {
    /// Parse attributes from JSON text
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}

/// Which client API items are fetched through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Vault-style store, no local secret involved
    Vault,
    /// Encrypted files decrypted with a local shared secret
    FileSecret,
}

/// Logical purpose of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPurpose {
    Mysql,
    System,
}

impl std::str::FromStr for ItemPurpose {
    type Err = SecretsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mysql" => Ok(Self::Mysql),
            "system" => Ok(Self::System),
            other => Err(SecretsError::ConfigError(format!(
                "unknown item purpose '{}'",
                other
            ))),
        }
    }
}

/// Item identifiers per purpose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRefs {
    pub mysql: String,
    pub system: String,
}

impl ItemRefs {
    pub fn get(&self, purpose: ItemPurpose) -> &str {
        match purpose {
            ItemPurpose::Mysql => &self.mysql,
            ItemPurpose::System => &self.system,
        }
    }
}

/// Values returned when an item cannot supply a password
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PasswordDefaults {
    pub root: Option<String>,
    pub old_passwords: Option<String>,
    pub replication: Option<String>,
    pub backup: Option<String>,
    /// Name of the backup user; its password is stored under this key
    pub backup_username: String,
}

impl std::fmt::Debug for PasswordDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |v: &Option<String>| if v.is_some() { "[SET]" } else { "[UNSET]" };
        f.debug_struct("PasswordDefaults")
            .field("root", &mark(&self.root))
            .field("old_passwords", &mark(&self.old_passwords))
            .field("replication", &mark(&self.replication))
            .field("backup", &mark(&self.backup))
            .field("backup_username", &self.backup_username)
            .finish()
    }
}

/// Immutable resolver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Container (data bag) holding the items
    pub container: String,
    /// Per-node decryption secret file
    pub secret_file: Option<PathBuf>,
    /// Fallback decryption secret file
    pub default_secret_file: Option<PathBuf>,
    pub backend_mode: BackendMode,
    pub items: ItemRefs,
    pub defaults: PasswordDefaults,
}

fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

impl ResolverConfig {
    /// Build the configuration from host attributes
    pub fn from_attributes(attributes: HostAttributes) -> Self {
        let backend_mode = if attributes.use_vault {
            BackendMode::Vault
        } else {
            BackendMode::FileSecret
        };

        Self {
            container: non_empty_or(attributes.container, DEFAULT_CONTAINER),
            secret_file: non_empty_path(attributes.encrypted_secret_file_path),
            default_secret_file: non_empty_path(attributes.default_secret_file),
            backend_mode,
            items: ItemRefs {
                mysql: attributes.mysql_item_id,
                system: attributes.system_item_id,
            },
            defaults: PasswordDefaults {
                root: attributes.server_defaults.root_password,
                old_passwords: attributes.server_defaults.old_passwords,
                replication: attributes.server_defaults.replication.password,
                backup: attributes.backup_password,
                backup_username: non_empty_or(attributes.backup_username, DEFAULT_BACKUP_USERNAME),
            },
        }
    }

    /// Load host attributes from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SecretsError::ConfigError(format!(
                "attributes file {:?} not found",
                path
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let attributes = HostAttributes::from_json(&contents)?;
        debug!("Loaded host attributes from {:?}", path);
        Ok(Self::from_attributes(attributes))
    }

    /// Pick the secret file for file-backed items
    ///
    /// The per-node file wins when it exists on disk; otherwise the fallback
    /// file is used if configured, whether or not it exists yet.
    pub fn resolve_secret_file(&self) -> Option<PathBuf> {
        match &self.secret_file {
            Some(path) if path.exists() => Some(path.clone()),
            _ => self.default_secret_file.clone(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from_attributes(HostAttributes::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();

        assert_eq!(config.container, "passwords");
        assert_eq!(config.backend_mode, BackendMode::FileSecret);
        assert_eq!(config.items.get(ItemPurpose::Mysql), "mysql");
        assert_eq!(config.items.get(ItemPurpose::System), "system");
        assert_eq!(config.defaults.backup_username, "backup");
        assert!(config.defaults.root.is_none());
        assert!(config.resolve_secret_file().is_none());
    }

    #[test]
    fn test_from_json() {
        let attributes = HostAttributes::from_json(
            r#"{
                "useVault": true,
                "container": "db-secrets",
                "mysqlItemId": "mysql-item",
                "serverDefaults": {
                    "rootPassword": "root-default",
                    "oldPasswords": 0,
                    "replication": {"password": "repl-default"}
                },
                "backupUsername": "xtrabackup",
                "backupPassword": "backup-default"
            }"#,
        )
        .unwrap();
        let config = ResolverConfig::from_attributes(attributes);

        assert_eq!(config.backend_mode, BackendMode::Vault);
        assert_eq!(config.container, "db-secrets");
        assert_eq!(config.items.mysql, "mysql-item");
        assert_eq!(config.items.system, "system");
        assert_eq!(config.defaults.root.as_deref(), Some("root-default"));
        assert_eq!(config.defaults.old_passwords.as_deref(), Some("0"));
        assert_eq!(config.defaults.replication.as_deref(), Some("repl-default"));
        assert_eq!(config.defaults.backup.as_deref(), Some("backup-default"));
        assert_eq!(config.defaults.backup_username, "xtrabackup");
    }

    #[test]
    fn test_non_scalar_default_rejected() {
        let result = HostAttributes::from_json(r#"{"backupPassword": ["a", "b"]}"#);
        assert!(matches!(result, Err(SecretsError::SerializationError(_))));

        let err = HostAttributes::from_json(r#"{"backupPassword": {"pw": "hidden-default"}}"#)
            .err()
            .unwrap();
        assert!(!err.to_string().contains("hidden-default"), "{}", err);
    }

    #[test]
    fn test_empty_strings_are_unset() {
        let attributes = HostAttributes::from_json(
            r#"{"container": "", "encryptedSecretFilePath": "", "defaultSecretFile": ""}"#,
        )
        .unwrap();
        let config = ResolverConfig::from_attributes(attributes);

        assert_eq!(config.container, "passwords");
        assert!(config.secret_file.is_none());
        assert!(config.default_secret_file.is_none());
    }

    #[test]
    fn test_secret_file_selection() {
        let temp_dir = TempDir::new().unwrap();
        let node_secret = temp_dir.path().join("node_secret");
        let global_secret = temp_dir.path().join("global_secret");

        let mut config = ResolverConfig {
            secret_file: Some(node_secret.clone()),
            default_secret_file: Some(global_secret.clone()),
            ..ResolverConfig::default()
        };

        // Per-node file missing on disk: the global one is used
        assert_eq!(config.resolve_secret_file(), Some(global_secret.clone()));

        std::fs::write(&node_secret, "secret").unwrap();
        assert_eq!(config.resolve_secret_file(), Some(node_secret));

        config.secret_file = None;
        config.default_secret_file = None;
        assert_eq!(config.resolve_secret_file(), None);
    }

    #[test]
    fn test_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("attributes.json");

        assert!(matches!(
            ResolverConfig::load(&path),
            Err(SecretsError::ConfigError(_))
        ));

        std::fs::write(&path, r#"{"mysqlItemId": "db"}"#).unwrap();
        let config = ResolverConfig::load(&path).unwrap();
        assert_eq!(config.items.mysql, "db");
    }

    #[test]
    fn test_debug_hides_default_passwords() {
        let config = ResolverConfig {
            defaults: PasswordDefaults {
                root: Some("root-default".into()),
                ..PasswordDefaults::default()
            },
            ..ResolverConfig::default()
        };

        let debug = format!("{:?}", config);
        assert!(!debug.contains("root-default"));
        assert!(debug.contains("[SET]"));
    }

    #[test]
    fn test_item_purpose_parse() {
        assert_eq!("mysql".parse::<ItemPurpose>().unwrap(), ItemPurpose::Mysql);
        assert_eq!("system".parse::<ItemPurpose>().unwrap(), ItemPurpose::System);
        assert!("debian".parse::<ItemPurpose>().is_err());
    }
}
