//! Mapping store trait — the persistence abstraction for token mappings
//!
//! Every backend (NATS JetStream KV, in-memory, ...) implements
//! `MappingStore` to provide insert-if-absent writes, point lookups, and
//! existence checks for `MappingRecord`s.

use crate::config::MaskConfig;
use crate::error::{MaskError, Result};
use crate::types::{MappingRecord, StoreInfo};
use async_trait::async_trait;
use std::sync::Arc;

pub mod memory;
pub mod nats;

/// Core trait for mapping backends
///
/// Implementations must be safe to call concurrently from independent
/// requests and must never overwrite an existing record.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Insert a record if its token is not yet stored
    ///
    /// Returns `MaskError::DuplicateToken` when the token already exists.
    async fn put(&self, record: &MappingRecord) -> Result<()>;

    /// Look up the original value for a token; `None` when unknown
    async fn get(&self, masked: &str) -> Result<Option<String>>;

    /// Whether a token is already stored
    async fn exists(&self, masked: &str) -> Result<bool>;

    /// Backend status (record count, namespace)
    async fn info(&self) -> Result<StoreInfo>;

    /// Backend name (e.g., "nats", "memory")
    fn name(&self) -> &str;

    /// Health check, true if the backend is reachable
    ///
    /// Default implementation delegates to `info()` and returns true if it succeeds.
    async fn health(&self) -> Result<bool> {
        self.info().await.map(|_| true)
    }
}

#[async_trait]
impl<S: MappingStore + ?Sized> MappingStore for Arc<S> {
    async fn put(&self, record: &MappingRecord) -> Result<()> {
        (**self).put(record).await
    }

    async fn get(&self, masked: &str) -> Result<Option<String>> {
        (**self).get(masked).await
    }

    async fn exists(&self, masked: &str) -> Result<bool> {
        (**self).exists(masked).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        (**self).info().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn health(&self) -> Result<bool> {
        (**self).health().await
    }
}

/// Open the backend selected by `config.mapping_backend_uri`
///
/// Supported schemes: `nats://` (JetStream key-value bucket) and
/// `memory://` (process-local map).
pub async fn open(config: &MaskConfig) -> Result<Arc<dyn MappingStore>> {
    let uri = config.mapping_backend_uri.trim();
    let scheme = uri
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .ok_or_else(|| {
            MaskError::Config(format!("Mapping backend URI has no scheme: '{}'", uri))
        })?;

    match scheme.as_str() {
        "memory" => {
            tracing::info!(uri = %uri, "Using in-memory mapping store");
            Ok(Arc::new(memory::MemoryMappingStore::default()))
        }
        "nats" | "tls" => {
            let store = nats::NatsMappingStore::connect(config.nats_config()).await?;
            Ok(Arc::new(store))
        }
        other => Err(MaskError::Config(format!(
            "Unsupported mapping backend scheme '{}'",
            other
        ))),
    }
}
