//! NATS JetStream key-value client — connect, insert, lookup

use super::config::{NatsConfig, StorageType};
use crate::error::{MaskError, Result};
use crate::types::MappingRecord;
use async_nats::jetstream;
use async_nats::jetstream::kv;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// NATS JetStream key-value client
///
/// Low-level client for reading and writing mapping records. The bucket
/// handle owns the multiplexed connection, and each call borrows it only for
/// its own duration.
pub struct NatsClient {
    /// Key-value bucket holding the records
    bucket: kv::Store,

    /// Configuration
    config: Arc<NatsConfig>,
}

impl NatsClient {
    /// Connect to NATS and initialize the key-value bucket
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let connect_opts = build_connect_options(&config);

        let client = connect_opts
            .connect(&config.url)
            .await
            .map_err(|e| MaskError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, "Connected to NATS");

        let jetstream = jetstream::new(client);
        let bucket = ensure_bucket(&jetstream, &config).await?;

        Ok(Self {
            bucket,
            config: Arc::new(config),
        })
    }

    /// Insert a record, failing with `DuplicateToken` if the key exists
    pub async fn create(&self, record: &MappingRecord) -> Result<u64> {
        let token = record.masked_value.as_str();
        let key = encode_key(token);
        let payload = Bytes::from(serde_json::to_vec(record)?);

        let revision = self
            .with_timeout("create", self.bucket.create(&key, payload))
            .await?
            .map_err(|e| match e.kind() {
                kv::CreateErrorKind::AlreadyExists => MaskError::DuplicateToken(token.to_string()),
                _ => MaskError::Store(format!("Failed to store mapping for {}: {}", token, e)),
            })?;

        tracing::debug!(
            bucket = %self.config.bucket_name(),
            revision,
            entity_type = %record.entity_type,
            "Mapping stored"
        );

        Ok(revision)
    }

    /// Fetch the record stored under a token
    pub async fn record(&self, token: &str) -> Result<Option<MappingRecord>> {
        let key = encode_key(token);
        let entry = self
            .with_timeout("get", self.bucket.get(key))
            .await?
            .map_err(|e| MaskError::Store(format!("Failed to read mapping for {}: {}", token, e)))?;

        match entry {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of live records in the bucket
    pub async fn count(&self) -> Result<u64> {
        let status = self
            .with_timeout("status", self.bucket.status())
            .await?
            .map_err(|e| MaskError::Store(format!("Failed to get bucket status: {}", e)))?;
        Ok(status.values())
    }

    /// Get the configuration
    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    async fn with_timeout<T>(&self, op: &str, fut: impl Future<Output = T>) -> Result<T> {
        let secs = self.config.request_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| {
                MaskError::Timeout(format!(
                    "Key-value {} timed out after {}s on bucket '{}'",
                    op,
                    secs,
                    self.config.bucket_name()
                ))
            })
    }
}

/// Encode a token as a key-value key
///
/// Bucket keys only allow `[-/_=.a-zA-Z0-9]`, so tokens are stored under
/// their URL-safe base64 form.
pub fn encode_key(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(token.as_bytes())
}

/// Build NATS connect options from config
fn build_connect_options(config: &NatsConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}

/// Ensure the key-value bucket exists with the configured settings
async fn ensure_bucket(js: &jetstream::Context, config: &NatsConfig) -> Result<kv::Store> {
    let bucket_name = config.bucket_name();

    if let Ok(bucket) = js.get_key_value(bucket_name.clone()).await {
        tracing::info!(bucket = %bucket_name, "Key-value bucket ready");
        return Ok(bucket);
    }

    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let max_age = if config.max_age_secs > 0 {
        Duration::from_secs(config.max_age_secs)
    } else {
        Duration::ZERO
    };

    let bucket = js
        .create_key_value(kv::Config {
            bucket: bucket_name.clone(),
            description: "PII mask token mappings".to_string(),
            history: 1,
            max_age,
            storage,
            num_replicas: config.replicas,
            ..Default::default()
        })
        .await
        .map_err(|e| {
            MaskError::Store(format!(
                "Failed to create key-value bucket '{}': {}",
                bucket_name, e
            ))
        })?;

    tracing::info!(
        bucket = %bucket_name,
        storage = ?config.storage,
        "Key-value bucket created"
    );

    Ok(bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key_is_bucket_safe() {
        let key = encode_key("<MASKED_PERSON_123456>");
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_encode_key_distinct() {
        assert_ne!(
            encode_key("<MASKED_PERSON_123456>"),
            encode_key("<MASKED_PERSON_123457>")
        );
    }
}
