//! Node configuration: which storage and registry backends to run behind
//! the `inprocess` endpoint this node serves, and where to listen.

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Local { path: PathBuf },
    Memory,
}

#[derive(Debug, Clone)]
pub enum RegistryBackend {
    Redb { path: PathBuf },
    Memory,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub registry: RegistryBackend,
    /// 32-byte root secret this node's own factotum derives its signing
    /// and ECDH keys from, used to counter-sign a proxy reply when acting
    /// on another endpoint's behalf (see `gns_rpc::server::authenticate`).
    pub secret_key: [u8; 32],
}
