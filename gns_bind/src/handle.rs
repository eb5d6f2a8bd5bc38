//! A dialed service triple, and the context a dial is made under.

use std::sync::Arc;

use gns_factotum::Factotum;
use gns_path::UserName;

use crate::traits::{DirectoryService, KeyService, StorageService};

/// Identifies who is dialing: the local principal a remote dial
/// authenticates as, and the key material to sign the handshake with.
/// Two dials under the same user share a cached handle even if they
/// target the same endpoint from different call sites.
#[derive(Clone)]
pub struct DialContext {
    pub user: UserName,
    pub factotum: Arc<Factotum>,
}

impl DialContext {
    pub fn new(user: UserName, factotum: Arc<Factotum>) -> Self {
        Self { user, factotum }
    }
}

/// The three service interfaces one dial yields. Cheap to clone: every
/// field is an `Arc`.
#[derive(Clone)]
pub struct ServiceHandle {
    directory: Arc<dyn DirectoryService>,
    storage: Arc<dyn StorageService>,
    keys: Arc<dyn KeyService>,
}

impl ServiceHandle {
    pub fn new(directory: Arc<dyn DirectoryService>, storage: Arc<dyn StorageService>, keys: Arc<dyn KeyService>) -> Self {
        Self { directory, storage, keys }
    }

    pub fn directory(&self) -> &Arc<dyn DirectoryService> {
        &self.directory
    }

    pub fn storage(&self) -> &Arc<dyn StorageService> {
        &self.storage
    }

    pub fn keys(&self) -> &Arc<dyn KeyService> {
        &self.keys
    }

    /// Releases this handle's hold on whatever connection backs it.
    /// In-process and unassigned handles have nothing to release; a
    /// future pooled-remote-connection transport would close it here.
    pub fn close(self) {}
}
