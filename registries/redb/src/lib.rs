//! Redb-backed key registry service implementation.
//!
//! Suitable as the default local backend for a node running its own
//! authoritative key registry: every `get`/`set`/`delete` runs on a blocking
//! task since `redb` transactions are synchronous.

use gns_core::registry::{RegistryApi, RegistryKey, RegistryRecord};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::{path::Path, sync::Arc};

const TABLE: TableDefinition<(u8, &[u8]), &[u8]> = TableDefinition::new("registry");

#[derive(Clone)]
pub struct RedbRegistry {
    db: Arc<Database>,
}

impl RedbRegistry {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path.join("registry.redb"))?;

        // Ensure the table exists before the first read, which would
        // otherwise fail on a freshly created database.
        {
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(TABLE)?;
            }
            write_txn.commit()?;
        }

        Ok(Self { db: Arc::new(db) })
    }
}

impl std::fmt::Debug for RedbRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRegistry").finish()
    }
}

#[async_trait::async_trait]
impl RegistryApi for RedbRegistry {
    async fn get(&self, key: &RegistryKey) -> anyhow::Result<Option<RegistryRecord>> {
        let db = self.db.clone();
        let key = *key;

        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<RegistryRecord>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(TABLE)?;

            table
                .get(key.to_bytes())?
                .map(|guard| RegistryRecord::deserialize(bytes::Bytes::copy_from_slice(guard.value())))
                .transpose()
                .map_err(Into::into)
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb read task failed: {}", e))?
    }

    async fn set(&self, record: RegistryRecord) -> anyhow::Result<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(TABLE)?;
                let key_bytes = record.key.to_bytes();

                let existing = table
                    .get(key_bytes)?
                    .map(|guard| {
                        RegistryRecord::deserialize(bytes::Bytes::copy_from_slice(guard.value()))
                    })
                    .transpose()?;

                if record.should_store(existing.as_ref()) {
                    table.insert(key_bytes, record.serialize().as_ref())?;
                }
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb write task failed: {}", e))?
    }

    async fn delete(&self, key: &RegistryKey) -> anyhow::Result<()> {
        let db = self.db.clone();
        let key = *key;

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(TABLE)?;
                table.remove(key.to_bytes())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb delete task failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gns_core::registry::{RecordKind, RegistryKey, RegistryRecord};
    use gns_core::Hash;

    #[tokio::test]
    async fn set_get_delete_roundtrip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = RedbRegistry::open(dir.path())?;

        let key = RegistryKey::Local([7u8; 32]);
        let record = RegistryRecord::new(
            RecordKind::Pointer,
            key,
            1,
            Hash::new(b"payload"),
            Box::new([]),
            Some(bytes::Bytes::from_static(b"payload")),
        )?;

        registry.set(record.clone()).await?;
        assert_eq!(registry.get(&key).await?, Some(record));

        registry.delete(&key).await?;
        assert_eq!(registry.get(&key).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn lower_revision_does_not_overwrite() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = RedbRegistry::open(dir.path())?;
        let key = RegistryKey::Local([1u8; 32]);

        let newer = RegistryRecord::new(
            RecordKind::Pointer,
            key,
            5,
            Hash::new(b"newer"),
            Box::new([]),
            None,
        )?;
        let older = RegistryRecord::new(
            RecordKind::Pointer,
            key,
            1,
            Hash::new(b"older"),
            Box::new([]),
            None,
        )?;

        registry.set(newer.clone()).await?;
        registry.set(older).await?;
        assert_eq!(registry.get(&key).await?, Some(newer));
        Ok(())
    }
}
