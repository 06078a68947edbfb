//! Decrypted secret item

use std::collections::HashMap;
use zeroize::Zeroize;

use crate::error::{json_kind, Result, SecretsError};

/// Decrypted key/value pairs of one item - values are zeroed when dropped
///
/// A key whose stored value could not be read (not a scalar, not decryptable)
/// is kept apart with the reason, so the other keys stay usable.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct SecretItem {
    values: HashMap<String, String>,
    unreadable: HashMap<String, String>,
}

impl SecretItem {
    /// Create an empty item
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an item from a JSON object
    ///
    /// Strings are kept as they are, numbers and booleans are stringified.
    /// Any other value type marks only that key as unreadable.
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut item = Self::new();
        for (key, value) in object {
            match scalar_to_string(&key, value) {
                Ok(text) => item.insert(key, text),
                Err(e) => item.mark_unreadable(key, e.to_string()),
            }
        }
        item
    }

    /// Insert a value, replacing (and zeroing) any previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.unreadable.remove(&key);
        if let Some(mut old) = self.values.insert(key, value.into()) {
            old.zeroize();
        }
    }

    /// Record that the value under `key` exists but cannot be read
    ///
    /// `reason` ends up in logs and must not carry the value.
    pub fn mark_unreadable(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        let key = key.into();
        if let Some(mut old) = self.values.remove(&key) {
            old.zeroize();
        }
        self.unreadable.insert(key, reason.into());
    }

    /// Look up the value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Why the value under `key` could not be read, if it could not
    pub fn unreadable_reason(&self, key: &str) -> Option<&str> {
        self.unreadable.get(key).map(String::as_str)
    }

    /// Whether a readable value is present under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys with readable values, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Convert one JSON field value into its secret text form
pub(crate) fn scalar_to_string(key: &str, value: serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(SecretsError::MalformedItem(format!(
            "value for '{}' is not a scalar ({})",
            key,
            json_kind(&other)
        ))),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretItem {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut item = Self::new();
        for (key, value) in iter {
            item.insert(key, value);
        }
        item
    }
}

impl Drop for SecretItem {
    fn drop(&mut self) {
        for value in self.values.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for SecretItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        let mut unreadable: Vec<&str> = self.unreadable.keys().map(String::as_str).collect();
        unreadable.sort_unstable();
        f.debug_struct("SecretItem")
            .field("keys", &keys)
            .field("unreadable", &unreadable)
            .field("values", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_object() {
        let object = json!({"root": "s3cr3t", "old_passwords": 1, "flag": true})
            .as_object()
            .cloned()
            .unwrap();

        let item = SecretItem::from_json_object(object);
        assert_eq!(item.get("root"), Some("s3cr3t"));
        assert_eq!(item.get("old_passwords"), Some("1"));
        assert_eq!(item.get("flag"), Some("true"));
        assert_eq!(item.get("replication"), None);
        assert_eq!(item.len(), 3);
    }

    #[test]
    fn test_nested_values_only_affect_their_key() {
        let object = json!({
            "root": "s3cr3t",
            "hosts": ["db1", "db2"],
            "extra": {"nested": "hidden-value"},
            "gone": null
        })
        .as_object()
        .cloned()
        .unwrap();

        let item = SecretItem::from_json_object(object);
        assert_eq!(item.get("root"), Some("s3cr3t"));
        assert_eq!(item.len(), 1);

        for key in ["hosts", "extra", "gone"] {
            assert_eq!(item.get(key), None);
            assert!(item.unreadable_reason(key).is_some(), "{}", key);
        }
        let reason = item.unreadable_reason("extra").unwrap();
        assert!(reason.contains("object"));
        assert!(!reason.contains("hidden-value"));
        assert_eq!(item.unreadable_reason("root"), None);
    }

    #[test]
    fn test_insert_clears_unreadable_mark() {
        let mut item = SecretItem::new();
        item.mark_unreadable("root", "not decryptable");
        assert!(!item.contains_key("root"));

        item.insert("root", "s3cr3t");
        assert_eq!(item.get("root"), Some("s3cr3t"));
        assert_eq!(item.unreadable_reason("root"), None);

        item.mark_unreadable("root", "not decryptable");
        assert_eq!(item.get("root"), None);
    }

    #[test]
    fn test_debug_lists_keys_only() {
        let mut item: SecretItem = [("root", "s3cr3t"), ("backup", "b4ckup")].into_iter().collect();
        item.mark_unreadable("hosts", "value for 'hosts' is not a scalar (array)");
        let debug = format!("{:?}", item);

        assert!(debug.contains("root"));
        assert!(debug.contains("backup"));
        assert!(debug.contains("hosts"));
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("b4ckup"));
    }
}
