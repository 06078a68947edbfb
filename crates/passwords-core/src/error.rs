//! Error types for passwords-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for secret store operations
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Secret store error types
///
/// Errors fall into two classes. The validation class (see
/// [`SecretsError::is_validation`]) is surfaced to callers of the resolver;
/// everything else is treated as the store being unavailable and resolution
/// falls back to the caller's default.
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Validation failed loading data bag '{container}/{item}': {reason}")]
    ValidationFailed {
        container: String,
        item: String,
        reason: String,
    },

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Authorization rejected: {0}")]
    Authorization(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Secret file not found: {0}")]
    SecretFileNotFound(PathBuf),

    #[error("No decryption secret available")]
    NoSecret,

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Decryption failed: {0}")]
    DecryptionError(String),

    #[error("Unsupported encrypted item format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed item: {0}")]
    MalformedItem(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SecretsError {
    /// Whether the store rejected the request itself (bad item, schema
    /// mismatch, authorization) rather than being unreachable or unreadable
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed { .. } | Self::InvalidItem(_) | Self::Authorization(_)
        )
    }
}

/// Name the JSON type of a value without rendering the value itself
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::Bool(_) => "bool",
    }
}

impl From<reqwest::Error> for SecretsError {
    fn from(e: reqwest::Error) -> Self {
        SecretsError::NetworkError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_class() {
        assert!(SecretsError::InvalidItem("bad name".into()).is_validation());
        assert!(SecretsError::Authorization("403".into()).is_validation());
        assert!(SecretsError::ValidationFailed {
            container: "passwords".into(),
            item: "mysql".into(),
            reason: "denied".into(),
        }
        .is_validation());
    }

    #[test]
    fn test_unavailable_class() {
        assert!(!SecretsError::NetworkError("timeout".into()).is_validation());
        assert!(!SecretsError::NoSecret.is_validation());
        assert!(!SecretsError::ItemNotFound("passwords/mysql".into()).is_validation());
        assert!(!SecretsError::DecryptionError("bad tag".into()).is_validation());
        assert!(!SecretsError::SecretFileNotFound("/nope".into()).is_validation());
    }

    #[test]
    fn test_validation_message_names_item() {
        let err = SecretsError::ValidationFailed {
            container: "passwords".into(),
            item: "mysql-item".into(),
            reason: "Authorization rejected: 403".into(),
        };
        let message = err.to_string();
        assert!(message.contains("passwords/mysql-item"));
    }
}
