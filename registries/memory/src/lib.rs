//! In-process registry combinators: an in-memory backend plus composition
//! wrappers (`TeeRegistry`, `MultiRegistry`) for layering multiple
//! [`RegistryApi`] backends behind a single handle.

use std::sync::Arc;
use std::sync::RwLock;
use std::collections::HashMap;

use gns_core::registry::{RegistryApi, RegistryKey, RegistryRecord};

/// Process-local `RegistryApi` backed by a lock-protected hash map.
/// Useful for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: RwLock<HashMap<RegistryKey, RegistryRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegistry").finish()
    }
}

#[async_trait::async_trait]
impl RegistryApi for MemoryRegistry {
    async fn get(&self, key: &RegistryKey) -> anyhow::Result<Option<RegistryRecord>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn set(&self, record: RegistryRecord) -> anyhow::Result<()> {
        let mut entries = self.entries.write().unwrap();
        let existing = entries.get(&record.key);
        if record.should_store(existing) {
            entries.insert(record.key, record);
        }
        Ok(())
    }

    async fn delete(&self, key: &RegistryKey) -> anyhow::Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}

/// Reads from a fast local backend, falling back to a remote one on miss,
/// and writes to both. Used to keep a node's own registry warm while still
/// publishing updates for peers to see.
pub struct TeeRegistry {
    local: Arc<dyn RegistryApi + Send + Sync>,
    remote: Arc<dyn RegistryApi + Send + Sync>,
}

impl TeeRegistry {
    pub fn new(local: Arc<dyn RegistryApi + Send + Sync>, remote: Arc<dyn RegistryApi + Send + Sync>) -> Self {
        Self { local, remote }
    }
}

#[async_trait::async_trait]
impl RegistryApi for TeeRegistry {
    async fn get(&self, key: &RegistryKey) -> anyhow::Result<Option<RegistryRecord>> {
        if let Some(record) = self.local.get(key).await? {
            return Ok(Some(record));
        }
        self.remote.get(key).await
    }

    async fn set(&self, record: RegistryRecord) -> anyhow::Result<()> {
        self.local.set(record.clone()).await?;
        self.remote.set(record).await
    }

    async fn delete(&self, key: &RegistryKey) -> anyhow::Result<()> {
        self.local.delete(key).await?;
        self.remote.delete(key).await
    }
}

/// How many backends must succeed for a [`MultiRegistry::set`] to report success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    All,
    Any,
    Quorum(usize),
}

/// Fans reads out across backends in order (first hit wins) and writes out
/// to all of them in parallel, gated by a [`WritePolicy`].
pub struct MultiRegistry {
    backends: Vec<Arc<dyn RegistryApi + Send + Sync>>,
    policy: WritePolicy,
}

impl MultiRegistry {
    pub fn with_policy(backends: Vec<Arc<dyn RegistryApi + Send + Sync>>, policy: WritePolicy) -> Self {
        Self { backends, policy }
    }
}

#[async_trait::async_trait]
impl RegistryApi for MultiRegistry {
    async fn get(&self, key: &RegistryKey) -> anyhow::Result<Option<RegistryRecord>> {
        for backend in &self.backends {
            if let Some(record) = backend.get(key).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn set(&self, record: RegistryRecord) -> anyhow::Result<()> {
        let results = futures::future::join_all(
            self.backends.iter().map(|b| b.set(record.clone())),
        )
        .await;
        let ok_count = results.iter().filter(|r| r.is_ok()).count();

        let required = match self.policy {
            WritePolicy::All => self.backends.len(),
            WritePolicy::Any => 1.min(self.backends.len()),
            WritePolicy::Quorum(n) => n,
        };

        if ok_count >= required {
            Ok(())
        } else {
            let errs: Vec<String> = results
                .into_iter()
                .filter_map(|r| r.err())
                .map(|e| e.to_string())
                .collect();
            Err(anyhow::anyhow!(
                "only {ok_count}/{} backends accepted the write (need {required}): {}",
                self.backends.len(),
                errs.join("; ")
            ))
        }
    }

    async fn delete(&self, key: &RegistryKey) -> anyhow::Result<()> {
        futures::future::try_join_all(self.backends.iter().map(|b| b.delete(key))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gns_core::registry::RecordKind;
    use gns_core::Hash;

    fn record(revision: u64) -> RegistryRecord {
        RegistryRecord::new(
            RecordKind::Pointer,
            RegistryKey::Local([1u8; 32]),
            revision,
            Hash::new(revision.to_be_bytes()),
            Box::new([]),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn memory_registry_respects_revision_order() -> anyhow::Result<()> {
        let registry = MemoryRegistry::new();
        registry.set(record(1)).await?;
        registry.set(record(5)).await?;
        registry.set(record(2)).await?;
        let got = registry.get(&RegistryKey::Local([1u8; 32])).await?.unwrap();
        assert_eq!(got.revision, 5);
        Ok(())
    }

    #[tokio::test]
    async fn multi_registry_quorum_write() -> anyhow::Result<()> {
        let a = Arc::new(MemoryRegistry::new());
        let b = Arc::new(MemoryRegistry::new());
        let multi = MultiRegistry::with_policy(
            vec![a.clone(), b.clone()],
            WritePolicy::Quorum(1),
        );
        multi.set(record(1)).await?;
        assert!(a.get(&RegistryKey::Local([1u8; 32])).await?.is_some());
        assert!(b.get(&RegistryKey::Local([1u8; 32])).await?.is_some());
        Ok(())
    }
}
