//! # a3s-mask
//!
//! Reversible PII masking for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-mask` replaces personally identifiable information in free text with
//! opaque tokens such as `<MASKED_PERSON_482913>` and later restores the
//! original values from those tokens. Detection models plug in through the
//! `Detector` trait; token mappings persist through the `MappingStore` trait,
//! so backends can be swapped without changing application code.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_mask::{DetectionSpan, Masker, MemoryMappingStore, PatternDetector};
//!
//! # async fn example() -> a3s_mask::Result<()> {
//! let masker = Masker::new(MemoryMappingStore::default(), PatternDetector::with_defaults()?);
//!
//! // Spans from an external tagger
//! let outcome = masker
//!     .mask_spans(
//!         "John lives in Paris",
//!         vec![vec![
//!             DetectionSpan::new(0, 4, "PERSON", 0.93),
//!             DetectionSpan::new(14, 19, "LOCATION", 0.88),
//!         ]],
//!     )
//!     .await?;
//!
//! let restored = masker.unmask(&outcome.masked_text).await?;
//! assert_eq!(restored, "John lives in Paris");
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! - **memory** — In-memory store for testing and single-process use
//! - **nats** — NATS JetStream key-value bucket for durable, shared mappings
//!
//! ## Architecture
//!
//! - **SpanResolver** — merges detector output into ordered, disjoint spans
//! - **TokenMinter** — draws tokens and retries on collision
//! - **SubstitutionEngine** — offset-based replacement, one record per span
//! - **restore** — token scan and per-occurrence lookup
//! - **Masker** — high-level API tying the pieces together

pub mod config;
pub mod crypto;
pub mod detector;
pub mod error;
pub mod masker;
pub mod minter;
pub mod provider;
pub mod resolver;
pub mod restore;
pub mod substitute;
pub mod types;

// Re-export core types
pub use config::MaskConfig;
pub use crypto::{Aes256GcmEncryptor, EncryptedStore, SealedValue, ValueEncryptor};
pub use detector::{default_pattern_rules, CompositeDetector, Detector, PatternDetector, PatternRule};
pub use error::{MaskError, Result};
pub use masker::Masker;
pub use minter::{SuffixSpace, TokenMinter};
pub use provider::MappingStore;
pub use resolver::SpanResolver;
pub use substitute::SubstitutionEngine;
pub use types::{
    DetectionSpan, EntityFilter, MappingRecord, MaskOutcome, MaskToken, ResolvedSpan,
    ServiceStatus, StoreInfo,
};

// Re-export stores for convenience
pub use provider::memory::MemoryMappingStore;
pub use provider::nats::{NatsClient, NatsConfig, NatsMappingStore, StorageType};
