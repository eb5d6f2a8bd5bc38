use std::sync::Arc;

use gns_bind::{KeyService, UserRecord};
use gns_core::Endpoint;
use gns_path::UserName;
use gns_registry::KeyRegistry;
use gns_registry_memory::MemoryRegistry;

fn sample_record() -> UserRecord {
    UserRecord { signing_public: [1u8; 32], ecdh_public: [2u8; 32], home: Endpoint::Remote("gns.example.com:443".into()) }
}

#[tokio::test]
async fn publish_then_lookup_round_trips() {
    let registry = KeyRegistry::new(Arc::new(MemoryRegistry::new()));
    let alice = UserName::parse("alice@example.com").unwrap();

    registry.publish(&alice, sample_record(), 1).await.unwrap();
    let found = registry.lookup(&alice).await.unwrap();
    assert_eq!(found, sample_record());
}

#[tokio::test]
async fn unpublished_user_is_masked_not_exist() {
    let registry = KeyRegistry::new(Arc::new(MemoryRegistry::new()));
    let bob = UserName::parse("bob@example.com").unwrap();

    let err = registry.lookup(&bob).await.unwrap_err();
    assert_eq!(err.kind, gns_core::Kind::NotExist);
}

#[tokio::test]
async fn republish_with_higher_revision_replaces() {
    let registry = KeyRegistry::new(Arc::new(MemoryRegistry::new()));
    let alice = UserName::parse("alice@example.com").unwrap();

    registry.publish(&alice, sample_record(), 1).await.unwrap();
    let updated = UserRecord { signing_public: [9u8; 32], ..sample_record() };
    registry.publish(&alice, updated.clone(), 2).await.unwrap();

    let found = registry.lookup(&alice).await.unwrap();
    assert_eq!(found, updated);
}

#[tokio::test]
async fn key_service_trait_delegates_to_lookup() {
    let registry = KeyRegistry::new(Arc::new(MemoryRegistry::new()));
    let alice = UserName::parse("alice@example.com").unwrap();
    registry.publish(&alice, sample_record(), 1).await.unwrap();

    let via_trait: &dyn KeyService = &registry;
    let found = via_trait.lookup(&alice).await.unwrap();
    assert_eq!(found, sample_record());
}
