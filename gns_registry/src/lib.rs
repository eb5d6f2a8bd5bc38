//! The key registry service facade: publishes and looks up a
//! [`UserRecord`](gns_bind::UserRecord) — a user's two public keys and
//! home endpoint — over any `RegistryApi` backend, reusing the same
//! revision-ordered pointer mechanism `gns_dir` uses for root pointers
//! (see `gns_core::registry`), under a domain-separated key so the two
//! services never collide even when pointed at the same backend.
//!
//! Backend failures and "no such user" are deliberately indistinguishable
//! to callers: this is the one place in the system allowed to mask an I/O
//! error as `NotExist`, so that an attacker probing user names cannot tell
//! a down backend from an unregistered account.

mod record;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use gns_bind::{KeyService, UserRecord};
use gns_core::{GnsError, GnsResult, Hash, RecordKind, RegistryApi, RegistryKey, RegistryRecord};
use gns_path::UserName;

use record::UserRecordWire;

pub struct KeyRegistry {
    backend: Arc<dyn RegistryApi + Send + Sync>,
}

impl KeyRegistry {
    pub fn new(backend: Arc<dyn RegistryApi + Send + Sync>) -> Self {
        Self { backend }
    }

    fn registry_key(user: &UserName) -> RegistryKey {
        RegistryKey::Local(*Hash::new(format!("gns-registry-user:{user}")).as_bytes())
    }

    /// Publishes `record` at the next revision after whatever is
    /// currently stored (callers race freely; the higher revision wins,
    /// per `RegistryRecord::should_store`). Pass the prior revision (0 if
    /// none known) plus one, or call [`Self::lookup_revision`] first.
    pub async fn publish(&self, user: &UserName, record: UserRecord, revision: u64) -> GnsResult<()> {
        let wire = UserRecordWire::from(&record);
        let payload = Bytes::from(minicbor::to_vec(&wire).expect("encoding a UserRecordWire is infallible"));
        if payload.len() > gns_core::registry::MAX_INLINE_DATA_SIZE {
            return Err(GnsError::internal("user record exceeds the inline registry payload limit"));
        }
        let hash = Hash::new(&payload);
        let key = Self::registry_key(user);
        let registry_record = RegistryRecord::new(RecordKind::Pointer, key, revision, hash, Box::new([]), Some(payload))
            .map_err(|e| GnsError::invalid(e.to_string()))?;
        self.backend.set(registry_record).await.map_err(|e| GnsError::io(e.to_string()))
    }

    /// The revision currently stored for `user`, or 0 if nothing has been
    /// published yet. Used by callers computing the next revision to
    /// publish without racing themselves.
    pub async fn lookup_revision(&self, user: &UserName) -> GnsResult<u64> {
        let key = Self::registry_key(user);
        let record = self.backend.get(&key).await.map_err(|e| GnsError::io(e.to_string()))?;
        Ok(record.map(|r| r.revision).unwrap_or(0))
    }

    pub async fn lookup(&self, user: &UserName) -> GnsResult<UserRecord> {
        match self.lookup_inner(user).await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(%user, error = %e, "key registry lookup failed");
                Err(GnsError::masked_not_exist(format!("{user}: account not found")))
            }
        }
    }

    async fn lookup_inner(&self, user: &UserName) -> anyhow::Result<UserRecord> {
        let key = Self::registry_key(user);
        let record = self.backend.get(&key).await?.ok_or_else(|| anyhow::anyhow!("no record published for {user}"))?;
        let data = record.data.ok_or_else(|| anyhow::anyhow!("user record has no inline payload"))?;
        let wire: UserRecordWire = minicbor::decode(&data)?;
        UserRecord::try_from(wire)
    }
}

#[async_trait]
impl KeyService for KeyRegistry {
    async fn lookup(&self, user: &UserName) -> GnsResult<UserRecord> {
        KeyRegistry::lookup(self, user).await
    }
}

#[async_trait]
impl gns_rpc::AuthLookup for KeyRegistry {
    async fn signing_key_for(&self, user: &UserName) -> anyhow::Result<Option<[u8; 32]>> {
        match KeyRegistry::lookup(self, user).await {
            Ok(record) => Ok(Some(record.signing_public)),
            Err(_) => Ok(None),
        }
    }
}
