//! The `unassigned` transport's stub services: every method errors
//! `invalid`, for endpoints a caller named but never actually bound to a
//! backend (an unset home endpoint, a not-yet-provisioned user).

use async_trait::async_trait;
use bytes::Bytes;
use gns_core::{GnsError, GnsResult, Hash};
use gns_dir::Entry;
use gns_pack::{BlockDescriptor, Packing};
use gns_path::{PathName, UserName};

use crate::traits::{DirectoryService, KeyService, StorageService, UserRecord};

fn unassigned() -> GnsError {
    GnsError::invalid("unassigned transport")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnassignedDirectory;

#[async_trait]
impl DirectoryService for UnassignedDirectory {
    async fn lookup(&self, _caller: &UserName, _path: &PathName) -> GnsResult<Entry> {
        Err(unassigned())
    }

    async fn children(&self, _caller: &UserName, _dir: &PathName) -> GnsResult<Vec<Entry>> {
        Err(unassigned())
    }

    async fn read(&self, _caller: &UserName, _path: &PathName) -> GnsResult<Bytes> {
        Err(unassigned())
    }

    async fn put(
        &self,
        _caller: &UserName,
        _path: &PathName,
        _signed_name: String,
        _packing: Packing,
        _writer: [u8; 32],
        _time: u64,
        _attr: u8,
        _blocks: Vec<BlockDescriptor>,
        _packdata: Vec<u8>,
        _expected_sequence: u64,
    ) -> GnsResult<Entry> {
        Err(unassigned())
    }

    async fn make_directory(&self, _caller: &UserName, _path: &PathName, _writer: [u8; 32], _packing: Packing) -> GnsResult<Entry> {
        Err(unassigned())
    }

    async fn make_root(&self, _user: &UserName, _writer: [u8; 32]) -> GnsResult<Entry> {
        Err(unassigned())
    }

    async fn delete(&self, _caller: &UserName, _path: &PathName) -> GnsResult<()> {
        Err(unassigned())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnassignedStorage;

#[async_trait]
impl StorageService for UnassignedStorage {
    async fn get(&self, _hash: &Hash) -> GnsResult<Bytes> {
        Err(unassigned())
    }

    async fn put(&self, _bytes: Bytes) -> GnsResult<Hash> {
        Err(unassigned())
    }

    async fn contains(&self, _hash: &Hash) -> GnsResult<bool> {
        Err(unassigned())
    }

    async fn delete(&self, _hash: &Hash) -> GnsResult<()> {
        Err(unassigned())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnassignedKeys;

#[async_trait]
impl KeyService for UnassignedKeys {
    async fn lookup(&self, _user: &UserName) -> GnsResult<UserRecord> {
        Err(unassigned())
    }
}
