//! AES-256-GCM encryption of data bag values
//!
//! Each value of an encrypted item is stored as a version 3 envelope:
//! `{"encrypted_data": b64, "iv": b64, "auth_tag": b64, "version": 3, "cipher": "aes-256-gcm"}`
//! - IV: 12 bytes (96 bits) - standard for GCM
//! - Auth tag: 16 bytes (128 bits), no associated data
//! - Plaintext: the JSON document `{"json_wrapper": <value>}`

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::DataBagKey;
use crate::error::{json_kind, Result, SecretsError};

/// Envelope format version produced and understood by this module
pub const ENVELOPE_VERSION: u32 = 3;

/// Cipher name recorded in version 3 envelopes
pub const ENVELOPE_CIPHER: &str = "aes-256-gcm";

/// One encrypted value as it appears in an item file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// Base64 ciphertext (without the auth tag)
    pub encrypted_data: String,
    /// Base64 initialization vector
    pub iv: String,
    /// Base64 authentication tag; absent in older envelope versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_tag: Option<String>,
    /// Envelope format version
    pub version: u32,
    /// Cipher name
    pub cipher: String,
}

#[derive(Serialize, Deserialize)]
struct JsonWrapper {
    json_wrapper: serde_json::Value,
}

impl EncryptedValue {
    /// Interpret a raw JSON field of an item file as an envelope
    ///
    /// Error texts name the JSON type only, never the content.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(SecretsError::MalformedItem(format!(
                "expected an encrypted value, found {}",
                json_kind(value)
            )));
        }
        serde_json::from_value(value.clone()).map_err(|_| {
            SecretsError::MalformedItem("object is not an encrypted value envelope".to_string())
        })
    }

    /// Convert to the JSON form written into item files
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Encrypt a JSON value into a version 3 envelope
pub fn encrypt_value(value: &serde_json::Value, key: &DataBagKey) -> Result<EncryptedValue> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SecretsError::EncryptionError(e.to_string()))?;

    let plaintext = serde_json::to_vec(&JsonWrapper {
        json_wrapper: value.clone(),
    })?;

    // Generate random IV (12 bytes for GCM)
    let mut iv = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    // aes-gcm appends the auth tag to the ciphertext
    let ciphertext_with_tag = cipher
        .encrypt(nonce, plaintext.as_slice())
        .map_err(|e| SecretsError::EncryptionError(e.to_string()))?;

    if ciphertext_with_tag.len() < 16 {
        return Err(SecretsError::EncryptionError(
            "Ciphertext too short".to_string(),
        ));
    }

    let tag_start = ciphertext_with_tag.len() - 16;

    Ok(EncryptedValue {
        encrypted_data: STANDARD.encode(&ciphertext_with_tag[..tag_start]),
        iv: STANDARD.encode(iv),
        auth_tag: Some(STANDARD.encode(&ciphertext_with_tag[tag_start..])),
        version: ENVELOPE_VERSION,
        cipher: ENVELOPE_CIPHER.to_string(),
    })
}

/// Decrypt a version 3 envelope back into its JSON value
pub fn decrypt_value(encrypted: &EncryptedValue, key: &DataBagKey) -> Result<serde_json::Value> {
    if encrypted.version != ENVELOPE_VERSION || encrypted.cipher != ENVELOPE_CIPHER {
        return Err(SecretsError::UnsupportedFormat(format!(
            "version {} with cipher {}",
            encrypted.version, encrypted.cipher
        )));
    }

    let auth_tag = encrypted
        .auth_tag
        .as_deref()
        .ok_or_else(|| SecretsError::DecryptionError("Missing auth tag".to_string()))?;

    let iv = decode_field("IV", &encrypted.iv)?;
    let auth_tag = decode_field("auth tag", auth_tag)?;
    let mut ciphertext_with_tag = decode_field("ciphertext", &encrypted.encrypted_data)?;

    if iv.len() != 12 {
        return Err(SecretsError::DecryptionError(format!(
            "Invalid IV length: expected 12, got {}",
            iv.len()
        )));
    }
    if auth_tag.len() != 16 {
        return Err(SecretsError::DecryptionError(format!(
            "Invalid auth tag length: expected 16, got {}",
            auth_tag.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SecretsError::DecryptionError(e.to_string()))?;
    let nonce = Nonce::from_slice(&iv);

    // Reconstruct ciphertext with tag appended (as expected by aes-gcm)
    ciphertext_with_tag.extend_from_slice(&auth_tag);

    let plaintext = cipher
        .decrypt(nonce, ciphertext_with_tag.as_slice())
        .map_err(|_| SecretsError::DecryptionError("Wrong secret or corrupted value".to_string()))?;

    let wrapper: JsonWrapper = serde_json::from_slice(&plaintext).map_err(|_| {
        SecretsError::DecryptionError("Decrypted payload is not a wrapped JSON value".to_string())
    })?;

    Ok(wrapper.json_wrapper)
}

/// Base64 fields may carry line breaks from encoders that wrap output
fn decode_field(name: &str, encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SecretsError::DecryptionError(format!("Invalid {} base64: {}", name, e)))
}
