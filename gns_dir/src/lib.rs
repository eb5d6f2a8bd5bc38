//! The directory engine: per-user tree state, spine rewrite on every
//! mutation, and the access-checked facade callers use to read and write
//! entries. See the crate's tests for the
//! invariants this module upholds; `gns_access` supplies the Access/Group
//! file semantics this crate enforces but does not itself interpret.

pub mod actor;
pub mod context;
pub mod entry;
pub mod fetcher;
pub mod engine;
pub mod signer;
pub mod wire;

pub use context::DirContext;
pub use engine::DirectoryEngine;
pub use entry::{Entry, ATTR_DIRECTORY, ATTR_INCOMPLETE, ATTR_LINK, ATTR_PLAIN, ATTR_SHARDED};
pub use signer::{DerivedDirectorySigner, DirectorySigner};
