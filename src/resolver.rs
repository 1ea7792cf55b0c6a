//! Span resolution — merge detector output into an ordered, non-overlapping set
//!
//! Candidates from every detector are filtered by entity type, sorted, and
//! swept left to right. At a given start offset the longest span wins; an
//! earlier span always beats a later one that overlaps it. Remaining ties
//! fall back to confidence (higher first) and then entity type (lexicographic)
//! so the result never depends on detector iteration order.

use crate::types::{DetectionSpan, EntityFilter, ResolvedSpan};
use std::cmp::Ordering;

/// Merges raw detection spans into `ResolvedSpan`s
#[derive(Debug, Clone, Default)]
pub struct SpanResolver {
    allowed_types: EntityFilter,
}

impl SpanResolver {
    pub fn new(allowed_types: EntityFilter) -> Self {
        Self { allowed_types }
    }

    pub fn allowed_types(&self) -> &EntityFilter {
        &self.allowed_types
    }

    /// Resolve one or more detector result sets
    pub fn resolve<I>(&self, result_sets: I) -> Vec<ResolvedSpan>
    where
        I: IntoIterator<Item = Vec<DetectionSpan>>,
    {
        let mut candidates: Vec<DetectionSpan> = result_sets
            .into_iter()
            .flatten()
            .filter(|span| self.allowed_types.allows(&span.entity_type))
            .filter(|span| {
                if span.is_empty() {
                    tracing::warn!(
                        start = span.start,
                        end = span.end,
                        entity_type = %span.entity_type,
                        "Discarding empty detection span"
                    );
                    return false;
                }
                true
            })
            .collect();

        candidates.sort_by(compare_spans);

        let mut resolved: Vec<ResolvedSpan> = Vec::with_capacity(candidates.len());
        for span in candidates {
            if let Some(last) = resolved.last() {
                if span.start < last.end() {
                    tracing::trace!(
                        start = span.start,
                        end = span.end,
                        kept_start = last.start(),
                        kept_end = last.end(),
                        "Dropping overlapping span"
                    );
                    continue;
                }
            }
            resolved.push(ResolvedSpan(span));
        }

        resolved
    }
}

fn compare_spans(a: &DetectionSpan, b: &DetectionSpan) -> Ordering {
    a.start
        .cmp(&b.start)
        .then(b.end.cmp(&a.end))
        .then(confidence_rank(b.confidence).total_cmp(&confidence_rank(a.confidence)))
        .then_with(|| a.entity_type.cmp(&b.entity_type))
}

/// NaN ranks below every real confidence
fn confidence_rank(confidence: f64) -> f64 {
    if confidence.is_nan() {
        f64::NEG_INFINITY
    } else {
        confidence
    }
}

/// Check that spans are sorted by start and pairwise disjoint
pub fn is_ordered_and_disjoint(spans: &[ResolvedSpan]) -> bool {
    spans.windows(2).all(|w| w[0].end() <= w[1].start())
}
