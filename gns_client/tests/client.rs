use std::collections::HashMap;
use std::sync::Arc;

use gns_bind::{BindingRegistry, KeyService, UserRecord};
use gns_client::GnsClient;
use gns_core::{BlobStore, Endpoint, GnsResult};
use gns_dir::{DerivedDirectorySigner, DirContext, DirectoryEngine};
use gns_factotum::Factotum;
use gns_path::{PathName, UserName};
use gns_pack::Packing;
use gns_registry_memory::MemoryRegistry;
use gns_store_memory::MemoryStore;

struct StaticKeys {
    records: HashMap<UserName, UserRecord>,
}

#[async_trait::async_trait]
impl KeyService for StaticKeys {
    async fn lookup(&self, user: &UserName) -> GnsResult<UserRecord> {
        self.records.get(user).cloned().ok_or_else(|| gns_core::GnsError::not_exist(format!("{user}: account not found")))
    }
}

fn user(s: &str) -> UserName {
    UserName::parse(s).unwrap()
}

fn path(s: &str) -> PathName {
    PathName::parse(s).unwrap()
}

/// One node hosting both alice and bob in-process, with a single key
/// service that knows both of their public identities.
fn setup() -> (Arc<BindingRegistry>, Factotum, Factotum) {
    let alice_factotum = Factotum::from_root_secret([11u8; 32]);
    let bob_factotum = Factotum::from_root_secret([22u8; 32]);

    let mut records = HashMap::new();
    records.insert(
        user("alice@example.com"),
        UserRecord { signing_public: alice_factotum.public_identity().signing, ecdh_public: alice_factotum.public_identity().ecdh, home: Endpoint::InProcess },
    );
    records.insert(
        user("bob@example.com"),
        UserRecord { signing_public: bob_factotum.public_identity().signing, ecdh_public: bob_factotum.public_identity().ecdh, home: Endpoint::InProcess },
    );
    let keys = Arc::new(StaticKeys { records });

    let ctx = DirContext::new(BlobStore::new(MemoryStore::new()), Arc::new(MemoryRegistry::new()), Arc::new(DerivedDirectorySigner::new([1u8; 32])));
    let directory = DirectoryEngine::new(ctx);
    let storage = BlobStore::new(MemoryStore::new());

    let mut registry = BindingRegistry::new();
    registry.register_in_process(directory, storage, keys);
    (Arc::new(registry), alice_factotum, bob_factotum)
}

#[tokio::test]
async fn make_root_put_get_round_trips() {
    let (bindings, alice_factotum, _bob_factotum) = setup();
    let alice = user("alice@example.com");

    // the binding registry's KeyService is shared across every dial, so
    // any client dialing alice's home resolves the same static record.
    let keys_probe = bindings.dial(&gns_bind::DialContext::new(alice.clone(), Arc::new(Factotum::from_root_secret([99u8; 32]))), &Endpoint::InProcess).await.unwrap();
    let client = GnsClient::new(bindings.clone(), keys_probe.keys().clone(), alice.clone(), Arc::new(alice_factotum));

    client.make_root(&alice).await.unwrap();

    let entry = client.put(&path("alice@example.com/notes.txt"), Packing::EncryptedE2e, b"hello gns", &[], 0).await.unwrap();
    assert_eq!(entry.name, "alice@example.com/notes.txt");

    let fetched = client.get(&path("alice@example.com/notes.txt")).await.unwrap();
    assert_eq!(&fetched[..], b"hello gns");

    let children = client.children(&path("alice@example.com/")).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].local_name(), "notes.txt");
}

#[tokio::test]
async fn share_grants_then_revoke_is_prospective_only() {
    let (bindings, alice_factotum, bob_factotum) = setup();
    let alice = user("alice@example.com");
    let bob = user("bob@example.com");

    let handle = bindings.dial(&gns_bind::DialContext::new(alice.clone(), Arc::new(Factotum::from_root_secret([99u8; 32]))), &Endpoint::InProcess).await.unwrap();
    let alice_client = GnsClient::new(bindings.clone(), handle.keys().clone(), alice.clone(), Arc::new(alice_factotum));
    let bob_client = GnsClient::new(bindings.clone(), handle.keys().clone(), bob.clone(), Arc::new(bob_factotum));

    alice_client.make_root(&alice).await.unwrap();
    let entry = alice_client.put(&path("alice@example.com/secret.txt"), Packing::EncryptedE2e, b"top secret", &[alice.clone()], 0).await.unwrap();

    // bob has no wrapped key yet.
    assert!(bob_client.get(&path("alice@example.com/secret.txt")).await.is_err());

    alice_client.share(&path("alice@example.com/secret.txt"), &[alice.clone(), bob.clone()], entry.sequence).await.unwrap();
    let fetched = bob_client.get(&path("alice@example.com/secret.txt")).await.unwrap();
    assert_eq!(&fetched[..], b"top secret");

    let reshared = alice_client.lookup(&path("alice@example.com/secret.txt")).await.unwrap();
    alice_client.share(&path("alice@example.com/secret.txt"), &[alice.clone()], reshared.sequence).await.unwrap();

    assert!(bob_client.get(&path("alice@example.com/secret.txt")).await.is_err());
}
