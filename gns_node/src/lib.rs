//! The main GNS node implementation.
//!
//! This crate orchestrates the directory engine, a storage backend, and a
//! key registry backend into a running node that serves them over the
//! authenticated RPC transport (`gns_rpc`), and registers the same trio
//! as this process's own `inprocess` binding target so a local
//! [`gns_client::GnsClient`] in the same process can reach them without a
//! network round trip.

use std::sync::Arc;

use gns_core::RegistryApi;

use crate::config::{NodeConfig, RegistryBackend, StoreBackend};

pub mod config;
pub mod identity;
pub mod routes;

pub struct GnsNode {
    pub directory: Arc<gns_dir::DirectoryEngine>,
    pub storage: gns_core::BlobStore,
    pub keys: Arc<gns_registry::KeyRegistry>,
    pub bindings: Arc<gns_bind::BindingRegistry>,
    pub identity: Arc<gns_factotum::Factotum>,
    pub sessions: gns_rpc::SessionCache,
    bind_addr: std::net::SocketAddr,
}

impl GnsNode {
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let store = create_store(config.store)?;
        let registry_backend = create_registry(config.registry)?;
        let signer = Arc::new(gns_dir::DerivedDirectorySigner::new(config.secret_key));
        let dir_ctx = gns_dir::DirContext::new(store.clone(), registry_backend.clone(), signer);
        let directory = gns_dir::DirectoryEngine::new(dir_ctx);
        let keys = Arc::new(gns_registry::KeyRegistry::new(registry_backend));
        let identity = Arc::new(gns_factotum::Factotum::from_root_secret(config.secret_key));

        let mut bindings = gns_bind::BindingRegistry::new();
        bindings.register_in_process(directory.clone(), store.clone(), keys.clone());

        Ok(Self {
            directory,
            storage: store,
            keys,
            bindings: Arc::new(bindings),
            identity,
            sessions: gns_rpc::SessionCache::new(),
            bind_addr: config.bind_addr,
        })
    }

    /// Runs the node's axum server until the process is killed. Consumes
    /// `self` wrapped in an `Arc` since every request handler needs a
    /// shared reference to the same directory/storage/key state.
    pub async fn serve(self: Arc<Self>) -> anyhow::Result<()> {
        let bind_addr = self.bind_addr;
        let router = routes::router(self);
        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        tracing::info!(addr = %bind_addr, "gns node listening");
        axum::serve(listener, router).await?;
        Ok(())
    }
}

fn create_store(backend: StoreBackend) -> anyhow::Result<gns_core::BlobStore> {
    match backend {
        StoreBackend::Local { path } => {
            std::fs::create_dir_all(&path)?;
            let store = gns_store_local::LocalStore::create(gns_store_local::LocalStoreConfig { base_path: path.to_string_lossy().into_owned() });
            Ok(gns_core::BlobStore::new(store))
        }
        StoreBackend::Memory => Ok(gns_core::BlobStore::new(gns_store_memory::MemoryStore::new())),
    }
}

fn create_registry(backend: RegistryBackend) -> anyhow::Result<Arc<dyn RegistryApi + Send + Sync>> {
    match backend {
        RegistryBackend::Redb { path } => {
            std::fs::create_dir_all(&path)?;
            Ok(Arc::new(gns_registry_redb::RedbRegistry::open(&path)?))
        }
        RegistryBackend::Memory => Ok(Arc::new(gns_registry_memory::MemoryRegistry::new())),
    }
}
