use std::sync::Arc;

use gns_core::BlobStore;
use gns_dir::{DerivedDirectorySigner, DirContext, DirectoryEngine};
use gns_pack::Packing;
use gns_path::{PathName, UserName};
use gns_registry_memory::MemoryRegistry;
use gns_store_memory::MemoryStore;

fn engine() -> Arc<DirectoryEngine> {
    let ctx = DirContext::new(
        BlobStore::new(MemoryStore::new()),
        Arc::new(MemoryRegistry::new()),
        Arc::new(DerivedDirectorySigner::new([7u8; 32])),
    );
    DirectoryEngine::new(ctx)
}

fn alice() -> UserName {
    UserName::parse("alice@example.com").unwrap()
}

#[tokio::test]
async fn make_root_then_directory_then_lookup() {
    let engine = engine();
    let user = alice();
    let root = engine.make_root(&user, [1u8; 32]).await.unwrap();
    assert!(root.is_directory());

    let docs = PathName::parse("alice@example.com/docs").unwrap();
    let created = engine.make_directory(&user, &docs, [1u8; 32], Packing::SignedPlain).await.unwrap();
    assert!(created.is_directory());

    let looked_up = engine.lookup(&user, &docs).await.unwrap();
    assert_eq!(looked_up.name, created.name);

    let children = engine.children(&user, &PathName::parse("alice@example.com/").unwrap()).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].local_name(), "docs");
}

#[tokio::test]
async fn put_rejects_stale_sequence() {
    let engine = engine();
    let user = alice();
    engine.make_root(&user, [1u8; 32]).await.unwrap();

    let path = PathName::parse("alice@example.com/notes.txt").unwrap();
    let first = engine
        .put(&user, &path, path.canonical(), Packing::SignedPlain, [1u8; 32], 0, 0, Vec::new(), Vec::new(), 0)
        .await
        .unwrap();
    assert_eq!(first.sequence, 1);

    let second = engine
        .put(&user, &path, path.canonical(), Packing::SignedPlain, [1u8; 32], 0, 0, Vec::new(), Vec::new(), first.sequence)
        .await
        .unwrap();
    assert_eq!(second.sequence, 2);

    let stale = engine
        .put(&user, &path, path.canonical(), Packing::SignedPlain, [1u8; 32], 0, 0, Vec::new(), Vec::new(), first.sequence)
        .await;
    assert!(stale.is_err());
}

#[tokio::test]
async fn glob_lists_matching_children_sorted() {
    let engine = engine();
    let user = alice();
    engine.make_root(&user, [1u8; 32]).await.unwrap();

    for name in ["b.txt", "a.txt", "c.jpg"] {
        let path = PathName::parse(&format!("alice@example.com/{name}")).unwrap();
        engine.put(&user, &path, path.canonical(), Packing::SignedPlain, [1u8; 32], 0, 0, Vec::new(), Vec::new(), 0).await.unwrap();
    }

    let root = PathName::parse("alice@example.com/").unwrap();
    let matches = engine.glob(&user, &root, "*.txt").await.unwrap();
    let names: Vec<&str> = matches.iter().map(|e| e.local_name()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn stranger_cannot_read_without_access_grant() {
    let engine = engine();
    let owner = alice();
    let stranger = UserName::parse("bob@example.com").unwrap();
    engine.make_root(&owner, [1u8; 32]).await.unwrap();

    let path = PathName::parse("alice@example.com/secret.txt").unwrap();
    engine.put(&owner, &path, path.canonical(), Packing::SignedPlain, [1u8; 32], 0, 0, Vec::new(), Vec::new(), 0).await.unwrap();

    let result = engine.lookup(&stranger, &path).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn delete_refuses_non_empty_directory() {
    let engine = engine();
    let user = alice();
    engine.make_root(&user, [1u8; 32]).await.unwrap();

    let dir = PathName::parse("alice@example.com/docs").unwrap();
    engine.make_directory(&user, &dir, [1u8; 32], Packing::SignedPlain).await.unwrap();
    let file = PathName::parse("alice@example.com/docs/readme.txt").unwrap();
    engine.put(&user, &file, file.canonical(), Packing::SignedPlain, [1u8; 32], 0, 0, Vec::new(), Vec::new(), 0).await.unwrap();

    assert!(engine.delete(&user, &dir).await.is_err());
    engine.delete(&user, &file).await.unwrap();
    engine.delete(&user, &dir).await.unwrap();
}
