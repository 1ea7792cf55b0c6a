//! In-memory mapping store
//!
//! Records live in a process-local map. Lost on drop, but useful for tests
//! and single-process deployments.

use crate::error::{MaskError, Result};
use crate::provider::MappingStore;
use crate::types::{MappingRecord, StoreInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory mapping store
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryMappingStore {
    records: Arc<RwLock<HashMap<String, MappingRecord>>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Full record for a token, including metadata
    pub async fn record(&self, masked: &str) -> Option<MappingRecord> {
        self.records.read().await.get(masked).cloned()
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn put(&self, record: &MappingRecord) -> Result<()> {
        let key = record.masked_value.as_str();
        let mut records = self.records.write().await;
        if records.contains_key(key) {
            return Err(MaskError::DuplicateToken(key.to_string()));
        }
        records.insert(key.to_string(), record.clone());

        tracing::debug!(token = %key, entity_type = %record.entity_type, "Mapping stored");
        Ok(())
    }

    async fn get(&self, masked: &str) -> Result<Option<String>> {
        let records = self.records.read().await;
        Ok(records.get(masked).map(|r| r.original_value.clone()))
    }

    async fn exists(&self, masked: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(masked))
    }

    async fn info(&self) -> Result<StoreInfo> {
        Ok(StoreInfo {
            backend: "memory".to_string(),
            namespace: "memory".to_string(),
            records: self.records.read().await.len() as u64,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
