//! Error types for a3s-mask

use thiserror::Error;

/// Errors that can occur while masking or unmasking text
#[derive(Debug, Error)]
pub enum MaskError {
    /// External detector failure
    #[error("Detector '{detector}' failed: {reason}")]
    Detection {
        detector: String,
        reason: String,
    },

    /// Token minting gave up after repeated collisions
    #[error("Could not mint a unique token for entity type '{entity_type}' after {attempts} attempts")]
    MintExhausted {
        entity_type: String,
        attempts: u32,
    },

    /// Mapping backend connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Mapping backend error on put/get/exists
    #[error("Store error: {0}")]
    Store(String),

    /// A token was already present when the store tried to insert it
    #[error("Token already stored: {0}")]
    DuplicateToken(String),

    /// A span does not fit the text it was applied to
    #[error("Invalid span [{start}, {end}): {reason}")]
    InvalidSpan {
        start: usize,
        end: usize,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption or decryption of a stored value failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl MaskError {
    /// True for failures raised by the mapping backend
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Store(_) | Self::DuplicateToken(_) | Self::Timeout(_)
        )
    }
}

/// Result type alias for masking operations
pub type Result<T> = std::result::Result<T, MaskError>;
