//! High-level masking service built on pluggable detectors and stores
//!
//! `Masker` wires detection, span resolution, substitution, and restoration
//! together behind two calls: `mask` and `unmask`. It holds no per-request
//! state, so one instance can serve concurrent requests behind an `Arc`.

use crate::config::MaskConfig;
use crate::detector::{CompositeDetector, Detector};
use crate::error::Result;
use crate::minter::TokenMinter;
use crate::provider::MappingStore;
use crate::resolver::SpanResolver;
use crate::restore;
use crate::substitute::SubstitutionEngine;
use crate::types::{DetectionSpan, EntityFilter, MaskOutcome, ServiceStatus};
use std::sync::Arc;

/// Reversible PII masking service
pub struct Masker {
    detector: Arc<dyn Detector>,
    resolver: SpanResolver,
    engine: SubstitutionEngine,
    store: Arc<dyn MappingStore>,
}

impl Masker {
    /// Create a masker with default settings (PERSON and LOCATION, six-digit suffixes)
    pub fn new(store: impl MappingStore + 'static, detector: impl Detector + 'static) -> Self {
        Self {
            detector: Arc::new(detector),
            resolver: SpanResolver::new(EntityFilter::new(["PERSON", "LOCATION"])),
            engine: SubstitutionEngine::default(),
            store: Arc::new(store),
        }
    }

    /// Create a masker from configuration and already-initialized collaborators
    pub fn from_config(
        config: &MaskConfig,
        store: Arc<dyn MappingStore>,
        detector: Arc<dyn Detector>,
    ) -> Result<Self> {
        config.validate()?;
        let minter = TokenMinter::new(config.token_suffix_space, config.max_mint_attempts)?;

        tracing::info!(
            store = store.name(),
            detector = detector.name(),
            allowed_types = ?config.allowed_entity_types,
            suffix_space = config.token_suffix_space.size(),
            "Masker initialized"
        );

        Ok(Self {
            detector,
            resolver: SpanResolver::new(config.entity_filter()),
            engine: SubstitutionEngine::new(minter),
            store,
        })
    }

    /// Open the configured backend and build a masker with the given detectors
    pub async fn connect(config: &MaskConfig, detectors: CompositeDetector) -> Result<Self> {
        let store = crate::provider::open(config).await?;
        Self::from_config(config, store, Arc::new(detectors))
    }

    /// Mask PII in `text`, returning the masked text
    pub async fn mask(&self, text: &str) -> Result<String> {
        Ok(self.mask_detailed(text).await?.masked_text)
    }

    /// Mask PII in `text`, returning the masked text and the records written
    pub async fn mask_detailed(&self, text: &str) -> Result<MaskOutcome> {
        let spans = self
            .detector
            .detect(text, self.resolver.allowed_types())
            .await?;
        self.mask_spans(text, vec![spans]).await
    }

    /// Mask `text` using spans detected elsewhere
    ///
    /// Each element of `result_sets` is one detector's output.
    pub async fn mask_spans(
        &self,
        text: &str,
        result_sets: Vec<Vec<DetectionSpan>>,
    ) -> Result<MaskOutcome> {
        let resolved = self.resolver.resolve(result_sets);
        self.engine.mask(text, &resolved, self.store.as_ref()).await
    }

    /// Restore every resolvable token in `text`
    pub async fn unmask(&self, text: &str) -> Result<String> {
        restore::unmask(text, self.store.as_ref()).await
    }

    /// Liveness report for the service and its store
    pub async fn status(&self) -> ServiceStatus {
        let healthy = match self.store.health().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(store = self.store.name(), error = %e, "Store health check failed");
                false
            }
        };

        ServiceStatus {
            healthy,
            store: self.store.name().to_string(),
            detector: self.detector.name().to_string(),
            allowed_types: self.allowed_types().iter().map(str::to_string).collect(),
        }
    }

    /// Backend name
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Entity types eligible for masking
    pub fn allowed_types(&self) -> &EntityFilter {
        self.resolver.allowed_types()
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &dyn MappingStore {
        self.store.as_ref()
    }
}
