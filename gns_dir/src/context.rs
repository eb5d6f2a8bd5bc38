//! Immutable configuration threaded into every directory actor, replacing
//! an ambient global with an explicit value constructed once at startup.

use std::sync::Arc;

use gns_core::{BlobStore, RegistryApi};

use crate::signer::DirectorySigner;

/// Children-block size, in encoded bytes, above which a directory's
/// children are split across [`crate::actor::NUM_BUCKETS`] name-hash
/// buckets rather than stored as a single block. A deployment-chosen
/// constant; 16 KiB keeps a default single-node deployment's blocks well
/// under typical storage-service chunk sizes.
pub const DEFAULT_SHARD_THRESHOLD: usize = 16 * 1024;

pub struct DirContext {
    pub meta_store: BlobStore,
    pub root_registry: Arc<dyn RegistryApi + Send + Sync>,
    pub signer: Arc<dyn DirectorySigner>,
    pub shard_threshold: usize,
}

impl DirContext {
    pub fn new(
        meta_store: BlobStore,
        root_registry: Arc<dyn RegistryApi + Send + Sync>,
        signer: Arc<dyn DirectorySigner>,
    ) -> Self {
        Self {
            meta_store,
            root_registry,
            signer,
            shard_threshold: DEFAULT_SHARD_THRESHOLD,
        }
    }

    pub fn with_shard_threshold(mut self, threshold: usize) -> Self {
        self.shard_threshold = threshold;
        self
    }
}
