//! Encryption at rest for original values
//!
//! `EncryptedStore` wraps any `MappingStore` and seals each original value
//! with AES-256-GCM before it reaches the backend. Tokens stay in clear so
//! lookups and collision checks work unchanged. Each envelope names the key
//! that sealed it, so retired keys can still open older values.

use crate::error::{MaskError, Result};
use crate::provider::MappingStore;
use crate::types::{MappingRecord, StoreInfo};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sealed value envelope stored in place of `original_value`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedValue {
    /// Key that sealed the value
    pub key_id: String,

    /// 96-bit nonce, base64
    pub nonce: String,

    /// Sealed bytes, base64
    pub ciphertext: String,

    /// Distinguishes envelopes from plaintext that happens to be JSON
    #[serde(default = "default_sealed")]
    pub sealed: bool,
}

fn default_sealed() -> bool {
    true
}

impl SealedValue {
    /// Parse a stored string as an envelope, if it is one
    pub fn parse(stored: &str) -> Option<Self> {
        serde_json::from_str::<Self>(stored)
            .ok()
            .filter(|envelope| envelope.sealed)
    }
}

/// Trait for sealing and opening stored values
pub trait ValueEncryptor: Send + Sync {
    /// Encrypt a plaintext value, returning the serialized envelope
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt a serialized envelope back to the plaintext value
    fn decrypt(&self, sealed: &str) -> Result<String>;

    /// Key ID new values are sealed with
    fn active_key_id(&self) -> &str;
}

/// AES-256-GCM sealing with one active key and any number of retired keys
///
/// The key set is fixed at construction. Rotating means building a new
/// encryptor whose active key is the new one and whose retired keys cover
/// every key ID still present in the store.
pub struct Aes256GcmEncryptor {
    active_key_id: String,
    ciphers: HashMap<String, Aes256Gcm>,
}

impl Aes256GcmEncryptor {
    /// Seal new values with `key`, recorded under `key_id`
    pub fn new(key_id: impl Into<String>, key: &[u8; 32]) -> Self {
        let active_key_id = key_id.into();
        let ciphers = HashMap::from([(active_key_id.clone(), cipher_for(key))]);
        Self {
            active_key_id,
            ciphers,
        }
    }

    /// Keep opening values sealed under an older key
    ///
    /// A key ID that is already known keeps its original key.
    pub fn with_retired_key(mut self, key_id: impl Into<String>, key: &[u8; 32]) -> Self {
        self.ciphers
            .entry(key_id.into())
            .or_insert_with(|| cipher_for(key));
        self
    }

    fn cipher(&self, key_id: &str) -> Result<&Aes256Gcm> {
        self.ciphers
            .get(key_id)
            .ok_or_else(|| MaskError::Encryption(format!("No key with id '{}'", key_id)))
    }
}

fn cipher_for(key: &[u8; 32]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| MaskError::Encryption(format!("Envelope {} is not base64: {}", field, e)))
}

impl ValueEncryptor for Aes256GcmEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher(&self.active_key_id)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| MaskError::Encryption(format!("Sealing failed: {}", e)))?;

        let envelope = SealedValue {
            key_id: self.active_key_id.clone(),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
            sealed: true,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    fn decrypt(&self, sealed: &str) -> Result<String> {
        let envelope: SealedValue = serde_json::from_str(sealed)?;
        let cipher = self.cipher(&envelope.key_id)?;

        let nonce = decode("nonce", &envelope.nonce)?;
        if nonce.len() != 12 {
            return Err(MaskError::Encryption(format!(
                "Envelope nonce has {} bytes, expected 12",
                nonce.len()
            )));
        }
        let ciphertext = decode("ciphertext", &envelope.ciphertext)?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|e| MaskError::Encryption(format!("Opening failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| MaskError::Encryption(format!("Opened value is not UTF-8: {}", e)))
    }

    fn active_key_id(&self) -> &str {
        &self.active_key_id
    }
}

/// Mapping store decorator that seals original values
///
/// Values already in the backend that are not sealed envelopes are returned
/// as-is, so an existing plaintext namespace can be migrated in place.
pub struct EncryptedStore<S> {
    inner: S,
    encryptor: Box<dyn ValueEncryptor>,
}

impl<S: MappingStore> EncryptedStore<S> {
    pub fn new(inner: S, encryptor: impl ValueEncryptor + 'static) -> Self {
        Self {
            inner,
            encryptor: Box::new(encryptor),
        }
    }

    /// The wrapped backend
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MappingStore> MappingStore for EncryptedStore<S> {
    async fn put(&self, record: &MappingRecord) -> Result<()> {
        let sealed = MappingRecord {
            original_value: self.encryptor.encrypt(&record.original_value)?,
            ..record.clone()
        };
        self.inner.put(&sealed).await
    }

    async fn get(&self, masked: &str) -> Result<Option<String>> {
        match self.inner.get(masked).await? {
            Some(stored) if SealedValue::parse(&stored).is_some() => {
                self.encryptor.decrypt(&stored).map(Some)
            }
            Some(stored) => {
                tracing::warn!(token = %masked, "Returning unsealed mapping value");
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, masked: &str) -> Result<bool> {
        self.inner.exists(masked).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        self.inner.info().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health(&self) -> Result<bool> {
        self.inner.health().await
    }
}
