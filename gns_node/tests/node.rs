//! Exercises the actual HTTP/authenticated-RPC path end to end: a real
//! `GnsNode` bound to a loopback port, hit through `gns_bind::remote`'s
//! `RemoteDirectory`/`RemoteStorage`/`RemoteKeys` over `gns_rpc::RpcClient`,
//! rather than the `inprocess` transport `gns_client`'s own tests cover.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gns_bind::remote::{RemoteDirectory, RemoteKeys, RemoteStorage};
use gns_bind::{DirectoryService, KeyService, StorageService, UserRecord};
use gns_core::{Endpoint, Location};
use gns_factotum::Factotum;
use gns_node::config::{NodeConfig, RegistryBackend, StoreBackend};
use gns_node::GnsNode;
use gns_path::{PathName, UserName};
use gns_rpc::RpcClient;

async fn spawn_node(secret: [u8; 32], alice: &UserName, alice_factotum: &Factotum) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let node = Arc::new(
        GnsNode::new(NodeConfig { bind_addr: addr, store: StoreBackend::Memory, registry: RegistryBackend::Memory, secret_key: secret }).unwrap(),
    );
    node.keys
        .publish(
            alice,
            UserRecord { signing_public: alice_factotum.public_identity().signing, ecdh_public: alice_factotum.public_identity().ecdh, home: Endpoint::Remote(addr.to_string()) },
            1,
        )
        .await
        .unwrap();

    tokio::spawn(async move {
        node.serve().await.unwrap();
    });

    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    addr
}

fn user(s: &str) -> UserName {
    UserName::parse(s).unwrap()
}

fn path(s: &str) -> PathName {
    PathName::parse(s).unwrap()
}

#[tokio::test]
async fn make_root_put_get_round_trips_over_http() {
    let alice_factotum = Factotum::from_root_secret([42u8; 32]);
    let alice = user("alice@example.com");
    let addr = spawn_node([7u8; 32], &alice, &alice_factotum).await;

    let base = format!("http://{addr}");
    let client = Arc::new(RpcClient::new(base, alice.clone(), Arc::new(alice_factotum)).unwrap());
    let keys = RemoteKeys::new(client.clone());
    let directory = RemoteDirectory::new(client.clone());
    let storage = RemoteStorage::new(client.clone());

    let record = keys.lookup(&alice).await.unwrap();
    assert_eq!(record.home, Endpoint::Remote(addr.to_string()));

    let root = directory.make_root(&alice, record.signing_public).await.unwrap();
    assert!(root.is_directory());

    let hash = storage.put(bytes::Bytes::from_static(b"hello gns")).await.unwrap();
    let fetched = storage.get(&hash).await.unwrap();
    assert_eq!(&fetched[..], b"hello gns");
    assert!(storage.contains(&hash).await.unwrap());

    let entry = directory
        .put(
            &alice,
            &path("alice@example.com/notes.txt"),
            "alice@example.com/notes.txt".to_string(),
            gns_pack::Packing::Plain,
            record.signing_public,
            0,
            0,
            vec![gns_pack::BlockDescriptor { offset: 0, size: 9, location: Location::new(Endpoint::Remote(addr.to_string()), hash.to_hex()), pack_metadata: vec![] }],
            vec![],
            0,
        )
        .await
        .unwrap();
    assert_eq!(entry.name, "alice@example.com/notes.txt");

    let children = directory.children(&alice, &path("alice@example.com/")).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].local_name(), "notes.txt");

    let bytes = directory.read(&alice, &path("alice@example.com/notes.txt")).await.unwrap();
    assert_eq!(&bytes[..], b"hello gns");
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let alice_factotum = Factotum::from_root_secret([1u8; 32]);
    let alice = user("alice@example.com");
    let addr = spawn_node([9u8; 32], &alice, &alice_factotum).await;

    let response = reqwest::Client::new().post(format!("http://{addr}/api/directory/lookup")).body(Vec::new()).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key(gns_rpc::headers::AUTH_ERROR));
}
