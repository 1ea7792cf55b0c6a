//! NATS JetStream integration tests
//!
//! These tests require a running NATS server with JetStream enabled:
//!   nats-server -js
//!
//! Tests are skipped automatically if NATS is not available.

use a3s_mask::provider::nats::{NatsConfig, NatsMappingStore, StorageType};
use a3s_mask::{
    DetectionSpan, MappingRecord, MappingStore, MaskConfig, MaskError, MaskToken, Masker,
    PatternDetector,
};
use std::sync::Arc;

/// Try to connect to NATS. Returns None if server is unavailable.
async fn try_nats_store(suffix: &str) -> Option<NatsMappingStore> {
    let config = NatsConfig {
        url: "nats://127.0.0.1:4222".to_string(),
        database_name: "test_pii".to_string(),
        collection_name: format!("{}_{}", suffix, uuid::Uuid::new_v4().simple()),
        storage: StorageType::Memory,
        connect_timeout_secs: 2,
        max_age_secs: 300,
        ..Default::default()
    };

    match NatsMappingStore::connect(config).await {
        Ok(store) => Some(store),
        Err(_) => {
            eprintln!("NATS not available, skipping integration test");
            None
        }
    }
}

/// Helper to create a NATS-backed store, or skip the test
macro_rules! nats_store {
    ($suffix:expr) => {
        match try_nats_store($suffix).await {
            Some(s) => s,
            None => return,
        }
    };
}

#[tokio::test]
async fn test_nats_put_get_exists() {
    let store = nats_store!("put_get");
    let record = MappingRecord::new(MaskToken::new("PERSON", 424242), "John", "PERSON");

    store.put(&record).await.unwrap();

    assert!(store.exists("<MASKED_PERSON_424242>").await.unwrap());
    assert_eq!(
        store.get("<MASKED_PERSON_424242>").await.unwrap().as_deref(),
        Some("John")
    );

    let full = store.record("<MASKED_PERSON_424242>").await.unwrap().unwrap();
    assert_eq!(full.entity_type, "PERSON");
}

#[tokio::test]
async fn test_nats_get_unknown() {
    let store = nats_store!("unknown");
    assert_eq!(store.get("<MASKED_PERSON_9999>").await.unwrap(), None);
    assert!(!store.exists("<MASKED_PERSON_9999>").await.unwrap());
}

#[tokio::test]
async fn test_nats_put_is_insert_only() {
    let store = nats_store!("insert_only");
    let token = MaskToken::new("LOCATION", 100001);

    store
        .put(&MappingRecord::new(token.clone(), "Paris", "LOCATION"))
        .await
        .unwrap();
    let err = store
        .put(&MappingRecord::new(token.clone(), "Lyon", "LOCATION"))
        .await
        .unwrap_err();

    assert!(matches!(err, MaskError::DuplicateToken(_)));
    assert_eq!(store.get(token.as_str()).await.unwrap().as_deref(), Some("Paris"));
}

#[tokio::test]
async fn test_nats_info() {
    let store = nats_store!("info");
    store
        .put(&MappingRecord::new(MaskToken::new("PERSON", 1), "a", "PERSON"))
        .await
        .unwrap();
    store
        .put(&MappingRecord::new(MaskToken::new("PERSON", 2), "b", "PERSON"))
        .await
        .unwrap();

    let info = store.info().await.unwrap();
    assert_eq!(info.backend, "nats");
    assert!(info.namespace.starts_with("test_pii_info_"));
    assert_eq!(info.records, 2);
    assert!(store.health().await.unwrap());
}

#[tokio::test]
async fn test_nats_masker_roundtrip() {
    let store = nats_store!("masker");
    let masker = Masker::from_config(
        &MaskConfig::default(),
        Arc::new(store),
        Arc::new(PatternDetector::with_defaults().unwrap()),
    )
    .unwrap();

    let outcome = masker
        .mask_spans(
            "Paris is in Paris",
            vec![vec![
                DetectionSpan::new(0, 5, "LOCATION", 0.9),
                DetectionSpan::new(12, 17, "LOCATION", 0.9),
            ]],
        )
        .await
        .unwrap();

    assert_ne!(outcome.records[0].masked_value, outcome.records[1].masked_value);
    assert_eq!(
        masker.unmask(&outcome.masked_text).await.unwrap(),
        "Paris is in Paris"
    );
}

#[tokio::test]
async fn test_nats_connect_failure_is_connection_error() {
    let config = NatsConfig {
        url: "nats://127.0.0.1:1".to_string(),
        connect_timeout_secs: 1,
        ..Default::default()
    };
    match NatsMappingStore::connect(config).await {
        Err(e) => assert!(e.is_store_error()),
        Ok(_) => panic!("connected to a closed port"),
    }
}
