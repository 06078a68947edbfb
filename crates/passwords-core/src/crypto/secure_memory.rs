//! Secure memory handling with automatic zeroization

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Data bag encryption key - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataBagKey {
    key: [u8; 32],
}

impl DataBagKey {
    /// Create a new key from raw bytes
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Get the key bytes (use carefully - avoid copying)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for DataBagKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBagKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Shared secret text that data bag keys are derived from
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataBagSecret {
    value: String,
}

impl DataBagSecret {
    /// Create a secret from its text form
    ///
    /// Surrounding whitespace is stripped; `None` when nothing is left.
    pub fn new(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            value: trimmed.to_string(),
        })
    }

    /// Get the secret text (use carefully)
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for DataBagSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBagSecret")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_trimmed() {
        let secret = DataBagSecret::new("  my-secret\n").unwrap();
        assert_eq!(secret.expose(), "my-secret");
    }

    #[test]
    fn test_blank_secret_rejected() {
        assert!(DataBagSecret::new("").is_none());
        assert!(DataBagSecret::new(" \n\t").is_none());
    }

    #[test]
    fn test_debug_redacted() {
        let key = DataBagKey::new([7u8; 32]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains('7'));

        let secret = DataBagSecret::new("hunter2").unwrap();
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
    }
}
