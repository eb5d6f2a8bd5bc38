use std::sync::Arc;

use gns_bind::{BindingRegistry, DialContext, KeyService, UserRecord};
use gns_core::{BlobStore, Endpoint, GnsResult};
use gns_dir::{DerivedDirectorySigner, DirContext, DirectoryEngine};
use gns_factotum::Factotum;
use gns_path::UserName;
use gns_registry_memory::MemoryRegistry;
use gns_store_memory::MemoryStore;

struct NoKeys;

#[async_trait::async_trait]
impl KeyService for NoKeys {
    async fn lookup(&self, _user: &UserName) -> GnsResult<UserRecord> {
        Err(gns_core::GnsError::not_exist("no key service wired up in this test"))
    }
}

fn engine() -> Arc<DirectoryEngine> {
    let ctx = DirContext::new(BlobStore::new(MemoryStore::new()), Arc::new(MemoryRegistry::new()), Arc::new(DerivedDirectorySigner::new([1u8; 32])));
    DirectoryEngine::new(ctx)
}

#[tokio::test]
async fn in_process_dial_is_cached() {
    let mut registry = BindingRegistry::new();
    registry.register_in_process(engine(), BlobStore::new(MemoryStore::new()), Arc::new(NoKeys));

    let alice = UserName::parse("alice@example.com").unwrap();
    let ctx = DialContext::new(alice, Arc::new(Factotum::from_root_secret([2u8; 32])));

    assert!(registry.is_empty());
    let first = registry.dial(&ctx, &Endpoint::InProcess).await.unwrap();
    assert_eq!(registry.len(), 1);
    let second = registry.dial(&ctx, &Endpoint::InProcess).await.unwrap();
    assert_eq!(registry.len(), 1);
    assert!(Arc::ptr_eq(first.directory(), second.directory()));
}

#[tokio::test]
async fn unassigned_dial_always_errors_invalid() {
    let registry = BindingRegistry::new();
    let alice = UserName::parse("alice@example.com").unwrap();
    let ctx = DialContext::new(alice.clone(), Arc::new(Factotum::from_root_secret([2u8; 32])));

    let handle = registry.dial(&ctx, &Endpoint::Unassigned).await.unwrap();
    let err = handle.directory().lookup(&alice, &gns_path::PathName::parse("alice@example.com/x").unwrap()).await.unwrap_err();
    assert_eq!(err.kind, gns_core::Kind::Invalid);
}

#[tokio::test]
async fn in_process_dial_without_registration_errors() {
    let registry = BindingRegistry::new();
    let alice = UserName::parse("alice@example.com").unwrap();
    let ctx = DialContext::new(alice, Arc::new(Factotum::from_root_secret([2u8; 32])));

    assert!(registry.dial(&ctx, &Endpoint::InProcess).await.is_err());
}
