//! Core data types for the masking engine
//!
//! All serializable types use camelCase JSON for wire compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Prefix shared by every mask token
pub const TOKEN_PREFIX: &str = "MASKED";

/// Longest entity label kept in a token; longer labels are cut
pub const MAX_ENTITY_TYPE_LEN: usize = 96;

/// Upper bound on the length of any minted token
///
/// Brackets, prefix, two separators, the longest label and a `u64` suffix.
pub const MAX_TOKEN_LEN: usize = 2 + TOKEN_PREFIX.len() + 2 + MAX_ENTITY_TYPE_LEN + 20;

/// A PII span reported by a detector
///
/// Offsets are character (Unicode scalar value) positions into the source
/// text, half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSpan {
    /// Inclusive start offset
    pub start: usize,

    /// Exclusive end offset
    pub end: usize,

    /// Entity label (e.g., "PERSON", "LOCATION")
    pub entity_type: String,

    /// Detector confidence in `[0.0, 1.0]`
    pub confidence: f64,

    /// Which detector produced this span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector: Option<String>,
}

impl DetectionSpan {
    /// Create a span without detector attribution
    pub fn new(start: usize, end: usize, entity_type: impl Into<String>, confidence: f64) -> Self {
        Self {
            start,
            end,
            entity_type: entity_type.into(),
            confidence,
            detector: None,
        }
    }

    /// Attach the name of the detector that produced this span
    pub fn with_detector(mut self, detector: impl Into<String>) -> Self {
        self.detector = Some(detector.into());
        self
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True when the span covers nothing
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A span that survived overlap resolution
///
/// Only `SpanResolver` constructs these, so a `Vec<ResolvedSpan>` coming out
/// of the resolver is sorted by `start` and non-overlapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedSpan(pub(crate) DetectionSpan);

impl ResolvedSpan {
    pub fn start(&self) -> usize {
        self.0.start
    }

    pub fn end(&self) -> usize {
        self.0.end
    }

    pub fn entity_type(&self) -> &str {
        &self.0.entity_type
    }

    pub fn confidence(&self) -> f64 {
        self.0.confidence
    }

    /// The underlying detection span
    pub fn span(&self) -> &DetectionSpan {
        &self.0
    }

    pub fn into_inner(self) -> DetectionSpan {
        self.0
    }
}

/// An opaque placeholder of the form `<MASKED_{TYPE}_{suffix}>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskToken(String);

impl MaskToken {
    /// Build a token from an entity type and a numeric suffix
    ///
    /// The entity type is normalized so the token never contains `<` or `>`.
    pub fn new(entity_type: &str, suffix: u64) -> Self {
        Self(format!(
            "<{}_{}_{}>",
            TOKEN_PREFIX,
            normalize_entity_type(entity_type),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MaskToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Uppercase the label and replace anything outside `[A-Z0-9_]` with `_`
///
/// At most `MAX_ENTITY_TYPE_LEN` characters are kept.
pub fn normalize_entity_type(entity_type: &str) -> String {
    let normalized: String = entity_type
        .trim()
        .chars()
        .take(MAX_ENTITY_TYPE_LEN)
        .map(|c| {
            let c = c.to_ascii_uppercase();
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if normalized.is_empty() {
        "UNKNOWN".to_string()
    } else {
        normalized
    }
}

/// A persisted masked-token → original-value association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRecord {
    /// The token substituted into the text
    pub masked_value: MaskToken,

    /// The text the token replaced
    pub original_value: String,

    /// Entity label of the masked span
    #[serde(default)]
    pub entity_type: String,

    /// When the record was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl MappingRecord {
    /// Create a record stamped with the current time
    pub fn new(
        masked_value: MaskToken,
        original_value: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            masked_value,
            original_value: original_value.into(),
            entity_type: entity_type.into(),
            created_at: Utc::now(),
        }
    }
}

/// Result of a mask operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskOutcome {
    /// Text with every resolved span replaced by its token
    pub masked_text: String,

    /// Records written, in text order
    pub records: Vec<MappingRecord>,
}

/// Entity-type allow-list
///
/// An empty filter admits every type. Labels are compared after
/// normalization, so `"person"` and `"PERSON"` are the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityFilter(BTreeSet<String>);

impl EntityFilter {
    /// A filter that admits every entity type
    pub fn all() -> Self {
        Self(BTreeSet::new())
    }

    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            types
                .into_iter()
                .map(|t| normalize_entity_type(t.as_ref()))
                .collect(),
        )
    }

    pub fn allows(&self, entity_type: &str) -> bool {
        self.0.is_empty() || self.0.contains(&normalize_entity_type(entity_type))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Store status information
#[derive(Debug, Clone)]
pub struct StoreInfo {
    /// Backend name
    pub backend: String,
    /// Namespace holding the records (bucket, collection, ...)
    pub namespace: String,
    /// Number of stored records
    pub records: u64,
}

/// Service status reported by `Masker::status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub healthy: bool,
    pub store: String,
    pub detector: String,
    pub allowed_types: Vec<String>,
}
