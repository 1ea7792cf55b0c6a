//! NATS JetStream mapping store
//!
//! Implements `MappingStore` on a JetStream key-value bucket. Inserts use the
//! bucket's create operation, so the server itself rejects a second write for
//! the same token.

mod client;
mod config;

pub use client::{encode_key, NatsClient};
pub use config::{NatsConfig, StorageType};

use crate::error::Result;
use crate::provider::MappingStore;
use crate::types::{MappingRecord, StoreInfo};
use async_trait::async_trait;

/// NATS JetStream mapping store
///
/// Wraps `NatsClient` and implements the `MappingStore` trait.
pub struct NatsMappingStore {
    client: NatsClient,
}

impl NatsMappingStore {
    /// Connect to NATS and initialize the key-value bucket
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let client = NatsClient::connect(config).await?;
        Ok(Self { client })
    }

    /// Get the underlying NATS client for advanced usage
    pub fn client(&self) -> &NatsClient {
        &self.client
    }

    /// Full record for a token, including metadata
    pub async fn record(&self, masked: &str) -> Result<Option<MappingRecord>> {
        self.client.record(masked).await
    }
}

#[async_trait]
impl MappingStore for NatsMappingStore {
    async fn put(&self, record: &MappingRecord) -> Result<()> {
        self.client.create(record).await.map(|_| ())
    }

    async fn get(&self, masked: &str) -> Result<Option<String>> {
        Ok(self
            .client
            .record(masked)
            .await?
            .map(|record| record.original_value))
    }

    async fn exists(&self, masked: &str) -> Result<bool> {
        Ok(self.client.record(masked).await?.is_some())
    }

    async fn info(&self) -> Result<StoreInfo> {
        let records = self.client.count().await?;
        Ok(StoreInfo {
            backend: "nats".to_string(),
            namespace: self.client.config().bucket_name(),
            records,
        })
    }

    fn name(&self) -> &str {
        "nats"
    }
}
