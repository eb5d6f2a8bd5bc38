//! [`BlobStore`]: a thin facade over an `Arc<dyn Store>` that maps content
//! hashes onto store paths.
//!
//! Paths are sharded into two-character prefix directories (`ab/cdef...`)
//! when the backend reports `case_sensitive`, otherwise base32 is used so
//! the path is safe on case-insensitive filesystems.

use std::sync::Arc;

use bytes::Bytes;

use crate::{hash::Hash, store::Store, store::StoreResult};

#[derive(Clone, Debug)]
pub struct BlobStore {
    store: Arc<dyn Store>,
}

impl BlobStore {
    pub fn new(store: impl Store) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn new_boxed(store: Box<dyn Store>) -> Self {
        Self {
            store: Arc::from(store),
        }
    }

    pub fn path_for_hash(&self, hash: &Hash) -> String {
        let encoded = if self.store.features().case_sensitive {
            data_encoding::BASE64URL_NOPAD.encode(hash.as_bytes())
        } else {
            data_encoding::BASE32_NOPAD.encode(hash.as_bytes()).to_lowercase()
        };
        format!("{}/{}", &encoded[..2], &encoded[2..])
    }

    pub async fn put(&self, bytes: Bytes) -> StoreResult<Hash> {
        let hash = Hash::new(&bytes);
        let path = self.path_for_hash(&hash);
        self.store.put_bytes(&path, bytes).await?;
        Ok(hash)
    }

    pub async fn get(&self, hash: &Hash) -> StoreResult<Bytes> {
        let path = self.path_for_hash(hash);
        self.store.open_read_bytes(&path, 0, None).await
    }

    pub async fn contains(&self, hash: &Hash) -> StoreResult<bool> {
        let path = self.path_for_hash(hash);
        self.store.exists(&path).await
    }

    pub async fn delete(&self, hash: &Hash) -> StoreResult<()> {
        let path = self.path_for_hash(hash);
        self.store.delete(&path).await
    }

    pub fn inner(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
