//! Token minting with collision checks
//!
//! Candidates combine the entity type with a suffix drawn uniformly from a
//! bounded numeric range. Each candidate is checked against the store, and
//! `mint_and_store` also treats a duplicate reported at write time as a
//! collision, so two concurrent requests racing for the same candidate both
//! end up with distinct tokens.

use crate::error::{MaskError, Result};
use crate::provider::MappingStore;
use crate::types::{MappingRecord, MaskToken};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default number of draws before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Inclusive range token suffixes are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixSpace {
    pub min: u64,
    pub max: u64,
}

impl Default for SuffixSpace {
    /// Six decimal digits
    fn default() -> Self {
        Self::digits(6)
    }
}

impl SuffixSpace {
    pub fn new(min: u64, max: u64) -> Result<Self> {
        let space = Self { min, max };
        space.validate()?;
        Ok(space)
    }

    /// All suffixes with exactly `n` decimal digits (`n` clamped to 1..=19)
    pub fn digits(n: u32) -> Self {
        let n = n.clamp(1, 19);
        let min = if n == 1 { 0 } else { 10u64.pow(n - 1) };
        let max = 10u64.pow(n) - 1;
        Self { min, max }
    }

    /// Number of distinct suffixes
    pub fn size(&self) -> u64 {
        self.max.saturating_sub(self.min).saturating_add(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(MaskError::Config(format!(
                "Token suffix space is empty: min {} > max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Generates mask tokens unique within a mapping store
#[derive(Debug, Clone)]
pub struct TokenMinter {
    space: SuffixSpace,
    max_attempts: u32,
}

impl Default for TokenMinter {
    fn default() -> Self {
        Self {
            space: SuffixSpace::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl TokenMinter {
    pub fn new(space: SuffixSpace, max_attempts: u32) -> Result<Self> {
        space.validate()?;
        if max_attempts == 0 {
            return Err(MaskError::Config(
                "max_mint_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            space,
            max_attempts,
        })
    }

    pub fn space(&self) -> SuffixSpace {
        self.space
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draw a candidate token without consulting any store
    pub fn candidate(&self, entity_type: &str) -> MaskToken {
        let suffix = rand::thread_rng().gen_range(self.space.min..=self.space.max);
        MaskToken::new(entity_type, suffix)
    }

    /// Draw a token not currently present in `store`
    ///
    /// The token is not reserved; a concurrent writer may still claim it
    /// before the caller stores it. Use `mint_and_store` to close that gap.
    pub async fn mint<S>(&self, entity_type: &str, store: &S) -> Result<MaskToken>
    where
        S: MappingStore + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let token = self.candidate(entity_type);
            if !store.exists(token.as_str()).await? {
                return Ok(token);
            }
            tracing::warn!(token = %token, attempt, "Token collision, redrawing");
        }

        Err(self.exhausted(entity_type))
    }

    /// Mint a token and persist its mapping in one step
    ///
    /// A duplicate reported by the store at write time counts as one more
    /// collision and triggers a redraw. Any other store failure aborts.
    pub async fn mint_and_store<S>(
        &self,
        entity_type: &str,
        original: &str,
        store: &S,
    ) -> Result<MappingRecord>
    where
        S: MappingStore + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let token = self.candidate(entity_type);
            if store.exists(token.as_str()).await? {
                tracing::warn!(token = %token, attempt, "Token collision, redrawing");
                continue;
            }

            let record = MappingRecord::new(token, original, entity_type);
            match store.put(&record).await {
                Ok(()) => return Ok(record),
                Err(MaskError::DuplicateToken(token)) => {
                    tracing::warn!(token = %token, attempt, "Late token collision at write, redrawing");
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted(entity_type))
    }

    fn exhausted(&self, entity_type: &str) -> MaskError {
        tracing::warn!(
            entity_type = %entity_type,
            attempts = self.max_attempts,
            space = self.space.size(),
            "Token minting exhausted"
        );
        MaskError::MintExhausted {
            entity_type: entity_type.to_string(),
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryMappingStore;
    use crate::types::StoreInfo;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_space_is_six_digits() {
        let space = SuffixSpace::default();
        assert_eq!(space.min, 100_000);
        assert_eq!(space.max, 999_999);
        assert_eq!(space.size(), 900_000);
    }

    #[test]
    fn test_digits() {
        assert_eq!(SuffixSpace::digits(1), SuffixSpace { min: 0, max: 9 });
        assert_eq!(SuffixSpace::digits(4), SuffixSpace { min: 1000, max: 9999 });
    }

    #[test]
    fn test_invalid_space_rejected() {
        assert!(SuffixSpace::new(10, 1).is_err());
        assert!(TokenMinter::new(SuffixSpace::default(), 0).is_err());
    }

    #[test]
    fn test_candidate_within_space() {
        let minter = TokenMinter::new(SuffixSpace::new(40, 42).unwrap(), 3).unwrap();
        for _ in 0..50 {
            let token = minter.candidate("PERSON");
            let s = token.as_str();
            assert!(
                s == "<MASKED_PERSON_40>" || s == "<MASKED_PERSON_41>" || s == "<MASKED_PERSON_42>",
                "unexpected token {}",
                s
            );
        }
    }

    #[tokio::test]
    async fn test_mint_and_store_unique_until_exhausted() {
        // Three possible suffixes and plenty of retries: the first three mints
        // must succeed with distinct tokens, the fourth can only collide.
        let minter = TokenMinter::new(SuffixSpace::new(1, 3).unwrap(), 200).unwrap();
        let store = MemoryMappingStore::new();

        let mut seen = HashSet::new();
        for i in 0..3 {
            let record = minter
                .mint_and_store("PERSON", &format!("name-{}", i), &store)
                .await
                .unwrap();
            assert!(seen.insert(record.masked_value.clone()));
        }

        let err = minter.mint_and_store("PERSON", "overflow", &store).await.unwrap_err();
        assert!(matches!(
            err,
            MaskError::MintExhausted { ref entity_type, attempts: 200 } if entity_type == "PERSON"
        ));
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_mint_skips_existing() {
        let minter = TokenMinter::new(SuffixSpace::new(1, 2).unwrap(), 200).unwrap();
        let store = MemoryMappingStore::new();
        store
            .put(&MappingRecord::new(MaskToken::new("PERSON", 1), "taken", "PERSON"))
            .await
            .unwrap();

        let token = minter.mint("PERSON", &store).await.unwrap();
        assert_eq!(token.as_str(), "<MASKED_PERSON_2>");
    }

    #[tokio::test]
    async fn test_many_mints_are_unique() {
        let minter = TokenMinter::default();
        let store = MemoryMappingStore::new();
        let mut seen = HashSet::new();
        for i in 0..500 {
            let record = minter
                .mint_and_store("LOCATION", &format!("place-{}", i), &store)
                .await
                .unwrap();
            assert!(seen.insert(record.masked_value));
        }
        assert_eq!(store.len().await, 500);
    }

    /// Store whose existence check never sees the racing writer, so the
    /// first `racing` puts report a duplicate.
    struct RacingStore {
        inner: MemoryMappingStore,
        racing: AtomicUsize,
    }

    #[async_trait]
    impl MappingStore for RacingStore {
        async fn put(&self, record: &MappingRecord) -> Result<()> {
            if self
                .racing
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(MaskError::DuplicateToken(record.masked_value.to_string()));
            }
            self.inner.put(record).await
        }

        async fn get(&self, masked: &str) -> Result<Option<String>> {
            self.inner.get(masked).await
        }

        async fn exists(&self, _masked: &str) -> Result<bool> {
            Ok(false)
        }

        async fn info(&self) -> Result<StoreInfo> {
            self.inner.info().await
        }

        fn name(&self) -> &str {
            "racing"
        }
    }

    #[tokio::test]
    async fn test_late_collision_is_retried() {
        let minter = TokenMinter::new(SuffixSpace::default(), 5).unwrap();
        let store = RacingStore {
            inner: MemoryMappingStore::new(),
            racing: AtomicUsize::new(2),
        };

        let record = minter.mint_and_store("PERSON", "John", &store).await.unwrap();
        assert_eq!(
            store.get(record.masked_value.as_str()).await.unwrap().as_deref(),
            Some("John")
        );
    }

    #[tokio::test]
    async fn test_late_collisions_count_toward_exhaustion() {
        let minter = TokenMinter::new(SuffixSpace::default(), 3).unwrap();
        let store = RacingStore {
            inner: MemoryMappingStore::new(),
            racing: AtomicUsize::new(10),
        };

        let err = minter.mint_and_store("PERSON", "John", &store).await.unwrap_err();
        assert!(matches!(err, MaskError::MintExhausted { attempts: 3, .. }));
    }

    struct FailingStore;

    #[async_trait]
    impl MappingStore for FailingStore {
        async fn put(&self, _record: &MappingRecord) -> Result<()> {
            Err(MaskError::Store("write refused".to_string()))
        }

        async fn get(&self, _masked: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn exists(&self, _masked: &str) -> Result<bool> {
            Ok(false)
        }

        async fn info(&self) -> Result<StoreInfo> {
            Err(MaskError::Connection("down".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_store_error_is_not_retried() {
        let minter = TokenMinter::default();
        let err = minter
            .mint_and_store("PERSON", "John", &FailingStore)
            .await
            .unwrap_err();
        assert!(matches!(err, MaskError::Store(_)));
    }
}
