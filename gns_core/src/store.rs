//! The [`Store`] trait: a minimal content-addressable object store abstraction.
//!
//! Every storage service backend (local filesystem, in-memory, and future
//! remote backends reached through [`crate::BlobStore`]) implements this
//! trait. Paths passed to `Store` methods are opaque strings chosen by the
//! caller (typically a hex-encoded content hash); backends are free to
//! shard or case-fold them internally.

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

use crate::blob_location::BlobLocation;

pub type StoreResult<T, E = anyhow::Error> = std::result::Result<T, E>;

pub type PutResponse = ();

pub struct StoreFeatures {
    pub supports_rename: bool,
    pub case_sensitive: bool,
    pub recommended_max_dir_size: u64,
}

#[async_trait]
pub trait Store: std::fmt::Debug + Send + Sync + 'static {
    async fn put_stream(
        &self,
        path: &str,
        stream: Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static>,
    ) -> StoreResult<PutResponse>;

    fn features(&self) -> StoreFeatures;

    async fn exists(&self, path: &str) -> StoreResult<bool>;

    async fn put_bytes(&self, path: &str, bytes: Bytes) -> StoreResult<PutResponse>;

    async fn open_read_stream(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> StoreResult<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static>>;

    async fn open_read_bytes(&self, path: &str, offset: u64, max_len: Option<u64>)
    -> StoreResult<Bytes>;

    async fn delete(&self, path: &str) -> StoreResult<()>;

    async fn rename(&self, old_path: &str, new_path: &str) -> StoreResult<()>;

    /// Returns retrieval locations a remote peer could use to fetch this
    /// blob directly. Local and in-memory backends return an empty list.
    async fn provide(&self, path: &str) -> StoreResult<Vec<BlobLocation>>;
}
