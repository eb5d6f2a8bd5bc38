//! Bridges [`gns_access::AccessResolver`] to a running [`crate::engine::DirectoryEngine`].
//!
//! Access and Group file reads must never themselves be access-checked —
//! they are what the check is computed from — so this fetcher talks
//! directly to each user's actor, bypassing `DirectoryEngine::lookup`'s
//! permission gate entirely.

use std::sync::Weak;

use bytes::Bytes;
use gns_core::Hash;
use gns_path::PathName;

use crate::engine::DirectoryEngine;

pub struct EngineFetcher {
    pub(crate) engine: Weak<DirectoryEngine>,
}

impl EngineFetcher {
    pub fn new(engine: Weak<DirectoryEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl gns_access::FileFetcher for EngineFetcher {
    async fn fetch(&self, path: &PathName) -> anyhow::Result<Option<(Bytes, Hash)>> {
        let Some(engine) = self.engine.upgrade() else {
            return Ok(None);
        };
        let handle = engine.handle_for(&path.user);
        match handle.fetch_bytes(path.clone()).await {
            Ok(result) => Ok(Some(result)),
            Err(e) if e.kind == gns_core::Kind::NotExist => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_child(&self, dir: &PathName, name: &str) -> anyhow::Result<bool> {
        let Some(engine) = self.engine.upgrade() else {
            return Ok(false);
        };
        let handle = engine.handle_for(&dir.user);
        match handle.children(dir.clone()).await {
            Ok(children) => Ok(children.iter().any(|e| e.local_name() == name)),
            Err(e) if e.kind == gns_core::Kind::NotExist => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
