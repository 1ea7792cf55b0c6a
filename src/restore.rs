//! Restoration engine: resolves tokens in masked text back to originals
//!
//! Any `<...>` run without a nested `<` is a candidate token. Candidates the
//! store knows are replaced where they occur; unknown ones pass through
//! verbatim. Runs longer than any minted token never reach the store.

use crate::error::Result;
use crate::provider::MappingStore;
use crate::types::MAX_TOKEN_LEN;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^<>]+>").expect("static token pattern"))
}

/// Find every token-shaped substring as byte ranges, in order
pub fn find_tokens(text: &str) -> Vec<(usize, usize)> {
    token_pattern()
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Replace every resolvable token in `text` with its original value
///
/// A store error aborts the whole call. Each distinct token is looked up
/// once per call.
pub async fn unmask<S>(text: &str, store: &S) -> Result<String>
where
    S: MappingStore + ?Sized,
{
    let matches = find_tokens(text);
    if matches.is_empty() {
        return Ok(text.to_string());
    }

    let mut resolved: HashMap<&str, Option<String>> = HashMap::new();
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut restored = 0usize;

    for (start, end) in &matches {
        let token = &text[*start..*end];
        if !resolved.contains_key(token) {
            let original = if token.len() > MAX_TOKEN_LEN {
                None
            } else {
                store.get(token).await?
            };
            resolved.insert(token, original);
        }

        output.push_str(&text[cursor..*start]);
        match resolved.get(token).and_then(|v| v.as_deref()) {
            Some(original) => {
                output.push_str(original);
                restored += 1;
            }
            None => output.push_str(token),
        }
        cursor = *end;
    }
    output.push_str(&text[cursor..]);

    tracing::debug!(
        candidates = matches.len(),
        restored,
        unresolved = matches.len() - restored,
        store = store.name(),
        "Text unmasked"
    );

    Ok(output)
}
