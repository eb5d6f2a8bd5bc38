//! Service interfaces a dialed [`crate::handle::ServiceHandle`] exposes.
//! Mirrors `gns_dir::DirectoryEngine`'s own public surface so an in-process
//! handle is a thin pass-through and a remote handle is a faithful stand-in.

use async_trait::async_trait;
use bytes::Bytes;
use gns_core::{Endpoint, GnsResult, Hash};
use gns_dir::Entry;
use gns_pack::{BlockDescriptor, Packing};
use gns_path::{PathName, UserName};

#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn lookup(&self, caller: &UserName, path: &PathName) -> GnsResult<Entry>;
    async fn children(&self, caller: &UserName, dir: &PathName) -> GnsResult<Vec<Entry>>;
    async fn read(&self, caller: &UserName, path: &PathName) -> GnsResult<Bytes>;
    #[allow(clippy::too_many_arguments)]
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
    ) -> GnsResult<Entry>;
    async fn make_directory(&self, caller: &UserName, path: &PathName, writer: [u8; 32], packing: Packing) -> GnsResult<Entry>;
    async fn make_root(&self, user: &UserName, writer: [u8; 32]) -> GnsResult<Entry>;
    async fn delete(&self, caller: &UserName, path: &PathName) -> GnsResult<()>;
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn get(&self, hash: &Hash) -> GnsResult<Bytes>;
    async fn put(&self, bytes: Bytes) -> GnsResult<Hash>;
    async fn contains(&self, hash: &Hash) -> GnsResult<bool>;
    async fn delete(&self, hash: &Hash) -> GnsResult<()>;
}

/// What the key registry service publishes about one user: the two public
/// keys `gns_factotum::PublicIdentity` carries, plus the endpoint of the
/// directory/storage pair the user's root lives behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub signing_public: [u8; 32],
    pub ecdh_public: [u8; 32],
    pub home: Endpoint,
}

#[async_trait]
pub trait KeyService: Send + Sync {
    async fn lookup(&self, user: &UserName) -> GnsResult<UserRecord>;
}
