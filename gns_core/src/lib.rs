//! Shared wire types, the `Store` and `RegistryApi` traits, and the
//! common error type used by every crate in the workspace.
//!
//! This crate is the foundation layer: it knows about content hashes,
//! endpoints, and the generic registry mechanism, but nothing about paths,
//! packing, or directories — those live in `gns_path`, `gns_pack`, and
//! `gns_dir` respectively.

pub mod blob;
pub mod blob_location;
pub mod endpoint;
pub mod error;
pub mod hash;
pub mod registry;
pub mod store;

pub use blob::BlobStore;
pub use blob_location::BlobLocation;
pub use endpoint::{Endpoint, Location};
pub use error::{GnsError, GnsResult, Kind};
pub use hash::Hash;
pub use registry::{RecordKind, RegistryApi, RegistryKey, RegistryRecord};
pub use store::{PutResponse, Store, StoreFeatures, StoreResult};
