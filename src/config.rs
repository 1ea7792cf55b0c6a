//! Masking service configuration

use crate::error::{MaskError, Result};
use crate::minter::{SuffixSpace, DEFAULT_MAX_ATTEMPTS};
use crate::provider::nats::NatsConfig;
use crate::types::EntityFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// User-configurable settings for masking and mapping persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Mapping backend URI (`nats://host:port` or `memory://`)
    #[serde(default = "default_backend_uri")]
    pub mapping_backend_uri: String,

    /// Logical database holding the mappings
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Collection (bucket) within the database
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Entity types eligible for masking (empty = all)
    #[serde(default = "default_allowed_entity_types")]
    pub allowed_entity_types: Vec<String>,

    /// Range token suffixes are drawn from
    #[serde(default)]
    pub token_suffix_space: SuffixSpace,

    /// Draws per token before minting gives up
    #[serde(default = "default_max_mint_attempts")]
    pub max_mint_attempts: u32,

    /// Backend connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Backend per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_uri() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_database_name() -> String {
    "pii_data".to_string()
}

fn default_collection_name() -> String {
    "pii_collection".to_string()
}

fn default_allowed_entity_types() -> Vec<String> {
    vec!["PERSON".to_string(), "LOCATION".to_string()]
}

fn default_max_mint_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    5
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            mapping_backend_uri: default_backend_uri(),
            database_name: default_database_name(),
            collection_name: default_collection_name(),
            allowed_entity_types: default_allowed_entity_types(),
            token_suffix_space: SuffixSpace::default(),
            max_mint_attempts: default_max_mint_attempts(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl MaskConfig {
    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MaskConfig = toml::from_str(content)
            .map_err(|e| MaskError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    /// Returns default config if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            MaskError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.token_suffix_space.validate()?;
        if self.max_mint_attempts == 0 {
            return Err(MaskError::Config(
                "max_mint_attempts must be at least 1".to_string(),
            ));
        }
        if self.database_name.trim().is_empty() || self.collection_name.trim().is_empty() {
            return Err(MaskError::Config(
                "database_name and collection_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Entity allow-list as a filter
    pub fn entity_filter(&self) -> EntityFilter {
        EntityFilter::new(&self.allowed_entity_types)
    }

    /// NATS backend settings derived from this config
    pub fn nats_config(&self) -> NatsConfig {
        NatsConfig {
            url: self.mapping_backend_uri.clone(),
            database_name: self.database_name.clone(),
            collection_name: self.collection_name.clone(),
            connect_timeout_secs: self.connect_timeout_secs,
            request_timeout_secs: self.request_timeout_secs,
            ..Default::default()
        }
    }
}
