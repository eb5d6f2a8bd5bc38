//! Directory-block signing capability.
//!
//! End-to-end content packing is strictly client-side (the factotum that
//! wraps a file's content key never leaves the caller). Re-signing an
//! ancestor directory's `SignedPlain` block on every spine rewrite, though,
//! happens inside the directory engine itself — the engine plays the role
//! a directory server plays for a user's tree metadata. This
//! trait is the narrow capability the engine needs for that, kept separate
//! from `gns_factotum::Factotum`'s end-to-end content-key custody so the
//! two responsibilities don't blur.

use std::sync::Arc;

use gns_core::GnsResult;
use gns_factotum::Factotum;
use gns_path::UserName;

pub trait DirectorySigner: Send + Sync {
    fn factotum_for(&self, user: &UserName) -> GnsResult<Arc<Factotum>>;
}

/// Deterministically derives a per-user factotum from a process-wide root
/// secret and the user's canonical name. Suitable for a single node acting
/// as the directory-metadata signer for every user it hosts; a multi-node
/// deployment would instead look keys up from a secrets store, but that
/// plumbing is out of scope.
pub struct DerivedDirectorySigner {
    root_secret: [u8; 32],
}

impl DerivedDirectorySigner {
    pub fn new(root_secret: [u8; 32]) -> Self {
        Self { root_secret }
    }
}

impl DirectorySigner for DerivedDirectorySigner {
    fn factotum_for(&self, user: &UserName) -> GnsResult<Arc<Factotum>> {
        let seed = blake3::derive_key("gns/dir/signer", &[self.root_secret.as_slice(), user.to_string().as_bytes()].concat());
        Ok(Arc::new(Factotum::from_root_secret(seed)))
    }
}
