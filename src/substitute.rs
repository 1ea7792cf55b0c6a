//! Substitution engine: replaces resolved spans with freshly minted tokens
//!
//! Output is assembled left to right by slicing the source text between span
//! boundaries, so a value that also occurs outside a detected span is left
//! alone and two spans with the same value get two independent tokens.

use crate::error::{MaskError, Result};
use crate::minter::TokenMinter;
use crate::provider::MappingStore;
use crate::types::{MaskOutcome, ResolvedSpan};

/// Applies resolved spans to text, minting and persisting one token per span
#[derive(Debug, Clone, Default)]
pub struct SubstitutionEngine {
    minter: TokenMinter,
}

impl SubstitutionEngine {
    pub fn new(minter: TokenMinter) -> Self {
        Self { minter }
    }

    pub fn minter(&self) -> &TokenMinter {
        &self.minter
    }

    /// Mask `text` at the given spans
    ///
    /// All spans are validated before the first write. A failure after that
    /// point aborts the call; records already written stay in the store but
    /// no masked text is returned.
    pub async fn mask<S>(&self, text: &str, spans: &[ResolvedSpan], store: &S) -> Result<MaskOutcome>
    where
        S: MappingStore + ?Sized,
    {
        if spans.is_empty() {
            return Ok(MaskOutcome {
                masked_text: text.to_string(),
                records: Vec::new(),
            });
        }

        let byte_ranges = byte_ranges(text, spans)?;

        let mut masked_text = String::with_capacity(text.len() + spans.len() * 24);
        let mut records = Vec::with_capacity(spans.len());
        let mut cursor = 0;

        for (span, (start, end)) in spans.iter().zip(byte_ranges) {
            let original = &text[start..end];
            let record = self
                .minter
                .mint_and_store(span.entity_type(), original, store)
                .await?;

            masked_text.push_str(&text[cursor..start]);
            masked_text.push_str(record.masked_value.as_str());
            cursor = end;
            records.push(record);
        }
        masked_text.push_str(&text[cursor..]);

        tracing::debug!(
            spans = spans.len(),
            records = records.len(),
            store = store.name(),
            "Text masked"
        );

        Ok(MaskOutcome {
            masked_text,
            records,
        })
    }
}

/// Convert character-offset spans to byte ranges, checking order and bounds
fn byte_ranges(text: &str, spans: &[ResolvedSpan]) -> Result<Vec<(usize, usize)>> {
    // boundaries[i] is the byte offset of character i; the last entry is text.len()
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut previous_end = 0;
    spans
        .iter()
        .map(|span| {
            let (start, end) = (span.start(), span.end());
            let invalid = |reason: &str| MaskError::InvalidSpan {
                start,
                end,
                reason: reason.to_string(),
            };

            if start >= end {
                return Err(invalid("span is empty"));
            }
            if end > char_len {
                return Err(invalid(&format!("text has only {} characters", char_len)));
            }
            if start < previous_end {
                return Err(invalid("spans overlap or are out of order"));
            }
            previous_end = end;
            Ok((boundaries[start], boundaries[end]))
        })
        .collect()
}
