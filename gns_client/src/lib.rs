//! The client library: a thin facade over `gns_bind`'s binding registry
//! that gives a caller `Get`/`Put`/`Share`/directory operations addressed
//! by path name instead of a dialed service handle.

pub mod client;

pub use client::{GnsClient, DEFAULT_BLOCK_SIZE};
