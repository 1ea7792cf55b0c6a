//! NATS JetStream key-value backend configuration

use serde::{Deserialize, Serialize};

/// Storage type for the key-value bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Persisted to disk
    #[default]
    File,
    /// Held in server memory (tests, ephemeral deployments)
    Memory,
}

/// Connection and bucket settings for `NatsMappingStore`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsConfig {
    /// Server URL (e.g., `nats://127.0.0.1:4222`)
    #[serde(default = "default_url")]
    pub url: String,

    /// Logical database name, first half of the bucket name
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Logical collection name, second half of the bucket name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Bucket storage backend
    #[serde(default)]
    pub storage: StorageType,

    /// Optional auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Record expiry in seconds (0 = never expire)
    #[serde(default)]
    pub max_age_secs: u64,

    /// Bucket replica count
    #[serde(default = "default_replicas")]
    pub replicas: usize,
}

fn default_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_database_name() -> String {
    "pii_data".to_string()
}

fn default_collection_name() -> String {
    "pii_collection".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    5
}

fn default_replicas() -> usize {
    1
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            database_name: default_database_name(),
            collection_name: default_collection_name(),
            storage: StorageType::default(),
            token: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_age_secs: 0,
            replicas: default_replicas(),
        }
    }
}

impl NatsConfig {
    /// Key-value bucket name: `{database}_{collection}`
    ///
    /// Characters JetStream rejects in bucket names become `_`.
    pub fn bucket_name(&self) -> String {
        format!("{}_{}", self.database_name, self.collection_name)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}
