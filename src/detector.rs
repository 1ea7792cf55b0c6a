//! Detector seam: the PII recognizers the engine consumes
//!
//! Detection models (statistical taggers, pattern recognizers, remote
//! services) live outside this crate and plug in through `Detector`.
//! `CompositeDetector` runs several of them over the same text and hands
//! each result set to the resolver; `PatternDetector` is a regex
//! recognizer for structured identifiers.
//!
//! ```text
//! text → [Detector A] ─┐
//!      → [Detector B] ─┼→ result sets → SpanResolver
//!      → [Detector C] ─┘
//! ```

use crate::error::{MaskError, Result};
use crate::types::{DetectionSpan, EntityFilter};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A PII recognizer
///
/// Implementations are shared read-only across requests, so any model
/// state must be loaded before the first call.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect spans in `text`, restricted to the allowed entity types
    ///
    /// Offsets in the returned spans are character positions.
    async fn detect(&self, text: &str, allowed_types: &EntityFilter) -> Result<Vec<DetectionSpan>>;

    /// Human-readable name (used in logs and error reports)
    fn name(&self) -> &str;
}

#[async_trait]
impl<D: Detector + ?Sized> Detector for Arc<D> {
    async fn detect(&self, text: &str, allowed_types: &EntityFilter) -> Result<Vec<DetectionSpan>> {
        (**self).detect(text, allowed_types).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Runs several detectors concurrently and keeps one result set per detector
///
/// A failure in any detector fails the whole detection.
#[derive(Clone, Default)]
pub struct CompositeDetector {
    detectors: Vec<Arc<dyn Detector>>,
}

impl CompositeDetector {
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// Append a detector to the chain
    pub fn with(mut self, detector: impl Detector + 'static) -> Self {
        self.detectors.push(Arc::new(detector));
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector, returning result sets in registration order
    pub async fn detect_all(
        &self,
        text: &str,
        allowed_types: &EntityFilter,
    ) -> Result<Vec<Vec<DetectionSpan>>> {
        let runs = self.detectors.iter().map(|detector| async move {
            let spans = detector
                .detect(text, allowed_types)
                .await
                .map_err(|e| match e {
                    MaskError::Detection { .. } => e,
                    other => MaskError::Detection {
                        detector: detector.name().to_string(),
                        reason: other.to_string(),
                    },
                })?;

            let name = detector.name();
            tracing::debug!(detector = %name, spans = spans.len(), "Detection finished");
            Ok::<_, MaskError>(
                spans
                    .into_iter()
                    .map(|span| match span.detector {
                        Some(_) => span,
                        None => span.with_detector(name),
                    })
                    .collect::<Vec<_>>(),
            )
        });

        futures::future::try_join_all(runs).await
    }
}

#[async_trait]
impl Detector for CompositeDetector {
    async fn detect(&self, text: &str, allowed_types: &EntityFilter) -> Result<Vec<DetectionSpan>> {
        Ok(self
            .detect_all(text, allowed_types)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    fn name(&self) -> &str {
        "composite"
    }
}

/// A regex recognizer for one entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRule {
    /// Entity label reported for matches
    pub entity_type: String,
    /// Regular expression
    pub pattern: String,
    /// Confidence assigned to every match
    pub score: f64,
}

impl PatternRule {
    pub fn new(entity_type: impl Into<String>, pattern: impl Into<String>, score: f64) -> Self {
        Self {
            entity_type: entity_type.into(),
            pattern: pattern.into(),
            score,
        }
    }
}

/// Built-in recognizers for common structured identifiers
pub fn default_pattern_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            "EMAIL_ADDRESS",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            0.95,
        ),
        PatternRule::new(
            "PHONE_NUMBER",
            r"(?:\+?1[-. ]?)?\(?\b\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b",
            0.75,
        ),
        PatternRule::new("US_SSN", r"\b\d{3}-\d{2}-\d{4}\b", 0.85),
        PatternRule::new("CREDIT_CARD", r"\b(?:\d{4}[- ]?){3}\d{4}\b", 0.8),
        PatternRule::new(
            "IP_ADDRESS",
            r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b",
            0.7,
        ),
    ]
}

/// Regex-based detector
pub struct PatternDetector {
    name: String,
    rules: Vec<(PatternRule, Regex)>,
}

impl PatternDetector {
    /// Compile the given rules
    pub fn new(rules: Vec<PatternRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = Regex::new(&rule.pattern).map_err(|e| {
                    MaskError::Config(format!(
                        "Invalid pattern for {}: {}",
                        rule.entity_type, e
                    ))
                })?;
                Ok((rule, regex))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: "pattern".to_string(),
            rules,
        })
    }

    /// Detector with `default_pattern_rules()`
    pub fn with_defaults() -> Result<Self> {
        Self::new(default_pattern_rules())
    }

    /// Override the reported detector name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Synchronous detection, returning character-offset spans
    pub fn find(&self, text: &str, allowed_types: &EntityFilter) -> Vec<DetectionSpan> {
        let mut spans = Vec::new();
        let offsets = CharOffsets::new(text);

        for (rule, regex) in &self.rules {
            if !allowed_types.allows(&rule.entity_type) {
                continue;
            }
            for m in regex.find_iter(text) {
                spans.push(
                    DetectionSpan::new(
                        offsets.char_offset(m.start()),
                        offsets.char_offset(m.end()),
                        rule.entity_type.clone(),
                        rule.score,
                    )
                    .with_detector(self.name.clone()),
                );
            }
        }

        spans
    }
}

#[async_trait]
impl Detector for PatternDetector {
    async fn detect(&self, text: &str, allowed_types: &EntityFilter) -> Result<Vec<DetectionSpan>> {
        Ok(self.find(text, allowed_types))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Byte offset → character offset conversion for one text
struct CharOffsets<'a> {
    text: &'a str,
    ascii: bool,
}

impl<'a> CharOffsets<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            ascii: text.is_ascii(),
        }
    }

    fn char_offset(&self, byte_offset: usize) -> usize {
        if self.ascii {
            byte_offset
        } else {
            self.text[..byte_offset].chars().count()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Detector returning fixed spans
    struct FixedDetector {
        name: &'static str,
        spans: Vec<DetectionSpan>,
    }

    #[async_trait]
    impl Detector for FixedDetector {
        async fn detect(&self, _text: &str, allowed: &EntityFilter) -> Result<Vec<DetectionSpan>> {
            Ok(self
                .spans
                .iter()
                .filter(|s| allowed.allows(&s.entity_type))
                .cloned()
                .collect())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    struct BrokenDetector;

    #[async_trait]
    impl Detector for BrokenDetector {
        async fn detect(&self, _text: &str, _allowed: &EntityFilter) -> Result<Vec<DetectionSpan>> {
            Err(MaskError::Config("model weights missing".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_pattern_detector_email() {
        let detector = PatternDetector::with_defaults().unwrap();
        let spans = detector
            .detect("Write to jane.doe@example.com today", &EntityFilter::all())
            .await
            .unwrap();

        let email: Vec<_> = spans.iter().filter(|s| s.entity_type == "EMAIL_ADDRESS").collect();
        assert_eq!(email.len(), 1);
        assert_eq!((email[0].start, email[0].end), (9, 29));
        assert_eq!(email[0].detector.as_deref(), Some("pattern"));
    }

    #[tokio::test]
    async fn test_pattern_detector_respects_filter() {
        let detector = PatternDetector::with_defaults().unwrap();
        let spans = detector
            .detect("SSN 123-45-6789, mail a@b.io", &EntityFilter::new(["US_SSN"]))
            .await
            .unwrap();
        assert!(spans.iter().all(|s| s.entity_type == "US_SSN"));
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_pattern_detector_char_offsets() {
        let detector =
            PatternDetector::new(vec![PatternRule::new("EMAIL_ADDRESS", r"\S+@\S+", 0.9)]).unwrap();
        let spans = detector.find("Grüße: jo@x.de", &EntityFilter::all());
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (7, 14));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = PatternDetector::new(vec![PatternRule::new("BAD", "(unclosed", 0.5)]);
        assert!(matches!(result, Err(MaskError::Config(_))));
    }

    #[tokio::test]
    async fn test_composite_keeps_result_sets_in_order() {
        let composite = CompositeDetector::default()
            .with(FixedDetector {
                name: "ner",
                spans: vec![DetectionSpan::new(0, 4, "PERSON", 0.85)],
            })
            .with(FixedDetector {
                name: "spacy",
                spans: vec![
                    DetectionSpan::new(0, 4, "PERSON", 0.8),
                    DetectionSpan::new(14, 19, "LOCATION", 0.8),
                ],
            });

        let sets = composite
            .detect_all("John lives in Paris", &EntityFilter::all())
            .await
            .unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 1);
        assert_eq!(sets[0][0].detector.as_deref(), Some("ner"));
        assert_eq!(sets[1].len(), 2);
        assert_eq!(sets[1][1].detector.as_deref(), Some("spacy"));

        let flat = composite
            .detect("John lives in Paris", &EntityFilter::all())
            .await
            .unwrap();
        assert_eq!(flat.len(), 3);
    }

    #[tokio::test]
    async fn test_composite_failure_is_detection_error() {
        let composite = CompositeDetector::default()
            .with(FixedDetector {
                name: "ner",
                spans: vec![],
            })
            .with(BrokenDetector);

        let err = composite
            .detect_all("anything", &EntityFilter::all())
            .await
            .unwrap_err();
        match err {
            MaskError::Detection { detector, reason } => {
                assert_eq!(detector, "broken");
                assert!(reason.contains("model weights missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_composite() {
        let composite = CompositeDetector::default();
        assert!(composite.is_empty());
        let spans = composite.detect("text", &EntityFilter::all()).await.unwrap();
        assert!(spans.is_empty());
    }
}
