//! In-process service implementations: thin pass-throughs to a
//! `gns_dir::DirectoryEngine` and a `gns_core::BlobStore` already running in
//! this node, for the `inprocess` transport.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use gns_core::{BlobStore, GnsError, GnsResult, Hash};
use gns_dir::{DirectoryEngine, Entry};
use gns_pack::{BlockDescriptor, Packing};
use gns_path::{PathName, UserName};

use crate::traits::{DirectoryService, StorageService};

pub struct InProcessDirectory {
    engine: Arc<DirectoryEngine>,
}

impl InProcessDirectory {
    pub fn new(engine: Arc<DirectoryEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl DirectoryService for InProcessDirectory {
    async fn lookup(&self, caller: &UserName, path: &PathName) -> GnsResult<Entry> {
        self.engine.lookup(caller, path).await
    }

    async fn children(&self, caller: &UserName, dir: &PathName) -> GnsResult<Vec<Entry>> {
        self.engine.children(caller, dir).await
    }

    async fn read(&self, caller: &UserName, path: &PathName) -> GnsResult<Bytes> {
        self.engine.read(caller, path).await
    }

    async fn put(
        &self,
        caller: &UserName,
        path: &PathName,
        signed_name: String,
        packing: Packing,
        writer: [u8; 32],
        time: u64,
        attr: u8,
        blocks: Vec<BlockDescriptor>,
        packdata: Vec<u8>,
        expected_sequence: u64,
    ) -> GnsResult<Entry> {
        self.engine.put(caller, path, signed_name, packing, writer, time, attr, blocks, packdata, expected_sequence).await
    }

    async fn make_directory(&self, caller: &UserName, path: &PathName, writer: [u8; 32], packing: Packing) -> GnsResult<Entry> {
        self.engine.make_directory(caller, path, writer, packing).await
    }

    async fn make_root(&self, user: &UserName, writer: [u8; 32]) -> GnsResult<Entry> {
        self.engine.make_root(user, writer).await
    }

    async fn delete(&self, caller: &UserName, path: &PathName) -> GnsResult<()> {
        self.engine.delete(caller, path).await
    }
}

pub struct InProcessStorage {
    store: BlobStore,
}

impl InProcessStorage {
    pub fn new(store: BlobStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StorageService for InProcessStorage {
    async fn get(&self, hash: &Hash) -> GnsResult<Bytes> {
        self.store.get(hash).await.map_err(|e| GnsError::io(e.to_string()))
    }

    async fn put(&self, bytes: Bytes) -> GnsResult<Hash> {
        self.store.put(bytes).await.map_err(|e| GnsError::io(e.to_string()))
    }

    async fn contains(&self, hash: &Hash) -> GnsResult<bool> {
        self.store.contains(hash).await.map_err(|e| GnsError::io(e.to_string()))
    }

    async fn delete(&self, hash: &Hash) -> GnsResult<()> {
        self.store.delete(hash).await.map_err(|e| GnsError::io(e.to_string()))
    }
}
