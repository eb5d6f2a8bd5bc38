use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gns_node::config::{NodeConfig, RegistryBackend, StoreBackend};
use gns_node::GnsNode;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts a node serving the authenticated RPC transport
    Start {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:4443")]
        bind: SocketAddr,

        /// Path to a 32-byte root secret key file (hex or raw)
        #[arg(long)]
        secret_key_file: PathBuf,

        /// Directory to store blobs under; defaults to an in-memory store
        #[arg(long)]
        store_path: Option<PathBuf>,

        /// Directory to hold the redb-backed key registry; defaults to an
        /// in-memory registry
        #[arg(long)]
        registry_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Start { bind, secret_key_file, store_path, registry_path } => {
            let secret_key = gns_node::identity::load_secret_key(&secret_key_file)?;
            let store = match store_path {
                Some(path) => StoreBackend::Local { path },
                None => StoreBackend::Memory,
            };
            let registry = match registry_path {
                Some(path) => RegistryBackend::Redb { path },
                None => RegistryBackend::Memory,
            };
            let node = Arc::new(GnsNode::new(NodeConfig { bind_addr: bind, store, registry, secret_key })?);
            node.serve().await
        }
    }
}
