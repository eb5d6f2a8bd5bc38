//! The binding registry: the only globally mutable state in the system.
//! Holds a table from transport tag to dialer and memoizes per-(dialing
//! user, endpoint) service handles so repeated dials share one connection.
//! Registrations happen once at process start; lookups are read-mostly
//! afterward, backed by `dashmap` the way the rest of this workspace's
//! concurrent caches are.

use std::sync::Arc;

use dashmap::DashMap;
use gns_core::{Endpoint, GnsError, GnsResult};
use gns_path::UserName;

use crate::handle::{DialContext, ServiceHandle};
use crate::inprocess::{InProcessDirectory, InProcessStorage};
use crate::remote::{RemoteDirectory, RemoteKeys, RemoteStorage};
use crate::traits::KeyService;
use crate::unassigned::{UnassignedDirectory, UnassignedKeys, UnassignedStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TransportTag {
    InProcess,
    Remote,
    Unassigned,
}

impl TransportTag {
    fn of(endpoint: &Endpoint) -> Self {
        match endpoint {
            Endpoint::InProcess => TransportTag::InProcess,
            Endpoint::Remote(_) => TransportTag::Remote,
            Endpoint::Unassigned => TransportTag::Unassigned,
        }
    }
}

/// Produces a [`ServiceHandle`] for one endpoint under one transport. Does
/// not itself perform network I/O: dialing a `remote` endpoint only builds
/// an HTTP client and signs the first handshake lazily, on first use.
pub trait Dialer: Send + Sync {
    fn dial(&self, ctx: &DialContext, endpoint: &Endpoint) -> GnsResult<ServiceHandle>;
}

struct UnassignedDialer;

impl Dialer for UnassignedDialer {
    fn dial(&self, _ctx: &DialContext, _endpoint: &Endpoint) -> GnsResult<ServiceHandle> {
        Ok(ServiceHandle::new(Arc::new(UnassignedDirectory), Arc::new(UnassignedStorage), Arc::new(UnassignedKeys)))
    }
}

/// Dials `remote` endpoints over the authenticated RPC transport, keyed by
/// the network address named in the endpoint rather than the dialing
/// user's own home — a single node can hold handles to many peers.
struct RemoteDialer;

impl Dialer for RemoteDialer {
    fn dial(&self, ctx: &DialContext, endpoint: &Endpoint) -> GnsResult<ServiceHandle> {
        let Endpoint::Remote(address) = endpoint else {
            return Err(GnsError::internal("remote dialer invoked with a non-remote endpoint"));
        };
        let client = Arc::new(
            gns_rpc::RpcClient::new(format!("https://{address}"), ctx.user.clone(), ctx.factotum.clone())
                .map_err(|e| GnsError::io(e.to_string()))?,
        );
        Ok(ServiceHandle::new(
            Arc::new(RemoteDirectory::new(client.clone())),
            Arc::new(RemoteStorage::new(client.clone())),
            Arc::new(RemoteKeys::new(client)),
        ))
    }
}

/// Dials `inprocess`, returning this node's own locally running services
/// regardless of which endpoint address was asked for (there is only one
/// "here").
struct InProcessDialer {
    directory: Arc<gns_dir::DirectoryEngine>,
    storage: gns_core::BlobStore,
    keys: Arc<dyn KeyService>,
}

impl Dialer for InProcessDialer {
    fn dial(&self, _ctx: &DialContext, _endpoint: &Endpoint) -> GnsResult<ServiceHandle> {
        Ok(ServiceHandle::new(
            Arc::new(InProcessDirectory::new(self.directory.clone())),
            Arc::new(InProcessStorage::new(self.storage.clone())),
            self.keys.clone(),
        ))
    }
}

pub struct BindingRegistry {
    in_process: Option<Box<dyn Dialer>>,
    remote: Box<dyn Dialer>,
    unassigned: Box<dyn Dialer>,
    cache: DashMap<(UserName, Endpoint), ServiceHandle>,
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self { in_process: None, remote: Box::new(RemoteDialer), unassigned: Box::new(UnassignedDialer), cache: DashMap::new() }
    }

    /// Registers this node's own directory engine, blob store, and key
    /// service as the target of `inprocess` dials. Called once at startup.
    pub fn register_in_process(&mut self, directory: Arc<gns_dir::DirectoryEngine>, storage: gns_core::BlobStore, keys: Arc<dyn KeyService>) {
        self.in_process = Some(Box::new(InProcessDialer { directory, storage, keys }));
        self.cache.retain(|(_, endpoint), _| *endpoint != Endpoint::InProcess);
    }

    /// Overrides the `remote` dialer, e.g. in tests that want a fake
    /// transport instead of a real HTTPS client.
    pub fn register_remote(&mut self, dialer: Box<dyn Dialer>) {
        self.remote = dialer;
        self.cache.retain(|(_, endpoint), _| !matches!(endpoint, Endpoint::Remote(_)));
    }

    pub async fn dial(&self, ctx: &DialContext, endpoint: &Endpoint) -> GnsResult<ServiceHandle> {
        let cache_key = (ctx.user.clone(), endpoint.clone());
        if let Some(handle) = self.cache.get(&cache_key) {
            return Ok(handle.clone());
        }

        let dialer: &dyn Dialer = match TransportTag::of(endpoint) {
            TransportTag::InProcess => self
                .in_process
                .as_deref()
                .ok_or_else(|| GnsError::internal("no in-process services registered on this binding registry"))?,
            TransportTag::Remote => self.remote.as_ref(),
            TransportTag::Unassigned => self.unassigned.as_ref(),
        };

        let handle = dialer.dial(ctx, endpoint)?;
        self.cache.entry(cache_key).or_insert(handle.clone());
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
