//! Account password encryption at rest.
//!
//! Adapted from `dashboard/services/encryption.rs`'s AES-256-GCM scheme, but
//! made mandatory: a mail-bridge account credential is always a real IMAP/SMTP
//! password, so unlike the dashboard's optional "plaintext fallback" mode,
//! a missing or malformed `ENCRYPTION_MASTER_KEY` is a hard startup error
//! rather than a silent downgrade.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("ENCRYPTION_MASTER_KEY not set")]
    KeyNotConfigured,
    #[error("invalid encryption key: must be 32 bytes (64 hex characters)")]
    InvalidKeyLength,
    #[error("invalid hex in encryption key: {0}")]
    InvalidKeyHex(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid encrypted credential format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct EncryptedData {
    nonce: String,
    ciphertext: String,
}

const PREFIX: &str = "ENC:v1:";

/// Encrypts/decrypts account passwords with a single process-wide master key.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn from_env() -> Result<Self, CredentialError> {
        let key_hex =
            std::env::var("ENCRYPTION_MASTER_KEY").map_err(|_| CredentialError::KeyNotConfigured)?;
        Self::from_hex_key(&key_hex)
    }

    pub fn from_hex_key(key_hex: &str) -> Result<Self, CredentialError> {
        if key_hex.len() != 64 {
            return Err(CredentialError::InvalidKeyLength);
        }
        let key_bytes =
            hex::decode(key_hex).map_err(|e| CredentialError::InvalidKeyHex(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|_| CredentialError::InvalidKeyLength)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CredentialError::EncryptionFailed(e.to_string()))?;

        let packaged = EncryptedData {
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        };
        let json = serde_json::to_string(&packaged)
            .map_err(|e| CredentialError::EncryptionFailed(e.to_string()))?;
        Ok(format!("{PREFIX}{}", BASE64.encode(json.as_bytes())))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, CredentialError> {
        let encoded = encrypted
            .strip_prefix(PREFIX)
            .ok_or_else(|| CredentialError::InvalidFormat("missing ENC:v1: prefix".into()))?;

        let json_bytes = BASE64
            .decode(encoded)
            .map_err(|e| CredentialError::InvalidFormat(format!("base64 decode: {e}")))?;
        let json_str = String::from_utf8(json_bytes)
            .map_err(|e| CredentialError::InvalidFormat(format!("utf8 decode: {e}")))?;
        let packaged: EncryptedData = serde_json::from_str(&json_str)
            .map_err(|e| CredentialError::InvalidFormat(format!("json parse: {e}")))?;

        let nonce_bytes = BASE64
            .decode(&packaged.nonce)
            .map_err(|e| CredentialError::InvalidFormat(format!("nonce decode: {e}")))?;
        if nonce_bytes.len() != 12 {
            return Err(CredentialError::InvalidFormat(format!(
                "invalid nonce length: {} (expected 12)",
                nonce_bytes.len()
            )));
        }
        let ciphertext = BASE64
            .decode(&packaged.ciphertext)
            .map_err(|e| CredentialError::InvalidFormat(format!("ciphertext decode: {e}")))?;

        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|e| CredentialError::DecryptionFailed(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|e| CredentialError::DecryptionFailed(e.to_string()))
    }
}
