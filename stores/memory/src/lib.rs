//! In-memory [`gns_core::Store`] implementation, for tests and ephemeral nodes.

use anyhow::anyhow;
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::{self, Stream, TryStreamExt};
use gns_core::blob_location::BlobLocation;
use gns_core::store::{PutResponse, StoreFeatures, StoreResult};

#[derive(Debug)]
pub struct MemoryStore {
    files: DashMap<String, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(path: &str) -> anyhow::Error {
    anyhow!("no object at path '{}'", path)
}

#[async_trait::async_trait]
impl gns_core::Store for MemoryStore {
    async fn put_stream(
        &self,
        path: &str,
        stream: Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static>,
    ) -> StoreResult<PutResponse> {
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        let bytes = Bytes::from(chunks.concat());
        self.files.insert(path.to_string(), bytes);
        Ok(())
    }

    fn features(&self) -> StoreFeatures {
        StoreFeatures {
            supports_rename: true,
            case_sensitive: true,
            recommended_max_dir_size: u64::MAX,
        }
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.files.contains_key(path))
    }

    async fn put_bytes(&self, path: &str, bytes: Bytes) -> StoreResult<PutResponse> {
        self.files.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn open_read_stream(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> StoreResult<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static>>
    {
        let bytes = self.open_read_bytes(path, offset, max_len).await?;
        Ok(Box::new(stream::once(Box::pin(async { Ok(bytes) }))))
    }

    async fn open_read_bytes(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> StoreResult<Bytes> {
        let file = self.files.get(path).ok_or_else(|| not_found(path))?;
        let file_len = file.len();
        let start = offset as usize;

        if start >= file_len {
            return Ok(Bytes::new());
        }

        let remaining = file_len - start;
        let len = match max_len {
            Some(max) => std::cmp::min(remaining, max as usize),
            None => remaining,
        };
        Ok(file.slice(start..start + len))
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.files.remove(path).ok_or_else(|| not_found(path))?;
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> StoreResult<()> {
        if old_path == new_path {
            return Ok(());
        }
        let (_key, value) = self.files.remove(old_path).ok_or_else(|| not_found(old_path))?;
        self.files.insert(new_path.to_string(), value);
        Ok(())
    }

    async fn provide(&self, path: &str) -> StoreResult<Vec<BlobLocation>> {
        if !self.files.contains_key(path) {
            return Err(not_found(path));
        }
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gns_core::Store;

    #[tokio::test]
    async fn put_exists_delete_roundtrip() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.put_bytes("a", Bytes::from_static(b"x")).await?;
        assert!(store.exists("a").await?);
        assert_eq!(store.open_read_bytes("a", 0, None).await?, Bytes::from_static(b"x"));
        store.delete("a").await?;
        assert!(!store.exists("a").await?);
        Ok(())
    }

    #[tokio::test]
    async fn rename_moves_value() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.put_bytes("a", Bytes::from_static(b"x")).await?;
        store.rename("a", "b").await?;
        assert!(!store.exists("a").await?);
        assert!(store.exists("b").await?);
        Ok(())
    }
}
