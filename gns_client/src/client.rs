//! The client facade: one [`GnsClient`] per local principal, composing a
//! [`BindingRegistry`] (how to reach a path's owner) with a [`KeyService`]
//! (who that owner is) and the caller's own [`Factotum`] (how to prove it
//! and how to read anything packed for them).
//!
//! Every operation dials the target path's owner fresh through the
//! binding registry rather than caching a directory/storage handle itself;
//! the registry's own per-(user, endpoint) memoization (see `gns_bind`)
//! makes repeat dials cheap, so this type stays free of connection state.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use gns_bind::{BindingRegistry, DialContext, KeyService, ServiceHandle};
use gns_core::{Endpoint, GnsError, GnsResult, Hash, Location};
use gns_dir::Entry;
use gns_factotum::Factotum;
use gns_pack::{BlockDescriptor, BlockPacker, BlockUnpacker, EntryFields, Packdata, Packing};
use gns_path::{glob_match_element, PathName, UserName};

/// Content is split into blocks no larger than this before packing, the
/// same 256 KiB figure the mobile/wasm client bindings use for their own
/// chunked encryption.
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn pack_err(e: gns_pack::PackError) -> GnsError {
    use gns_pack::PackError::*;
    match e {
        Permission => GnsError::permission(e.to_string()),
        SignatureInvalid | IntegrityError => GnsError::internal(e.to_string()),
        other => GnsError::invalid(other.to_string()),
    }
}

fn hash_from_reference(reference: &str) -> GnsResult<Hash> {
    let bytes = hex::decode(reference).map_err(|e| GnsError::internal(format!("malformed location reference: {e}")))?;
    let arr: [u8; 32] = bytes.try_into().map_err(|_| GnsError::internal("location reference is not a 32-byte hash"))?;
    Ok(Hash::from_bytes(arr))
}

pub struct GnsClient {
    bindings: Arc<BindingRegistry>,
    keys: Arc<dyn KeyService>,
    user: UserName,
    factotum: Arc<Factotum>,
}

impl GnsClient {
    pub fn new(bindings: Arc<BindingRegistry>, keys: Arc<dyn KeyService>, user: UserName, factotum: Arc<Factotum>) -> Self {
        Self { bindings, keys, user, factotum }
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }

    /// Resolves `owner`'s home endpoint through the key service and dials
    /// it, authenticating as this client's own user.
    async fn dial(&self, owner: &UserName) -> GnsResult<(ServiceHandle, Endpoint)> {
        let record = self.keys.lookup(owner).await?;
        let ctx = DialContext::new(self.user.clone(), self.factotum.clone());
        let handle = self.bindings.dial(&ctx, &record.home).await?;
        Ok((handle, record.home))
    }

    async fn resolve_readers(&self, readers: &[UserName]) -> GnsResult<Vec<[u8; 32]>> {
        let mut keys = Vec::with_capacity(readers.len());
        for reader in readers {
            keys.push(self.keys.lookup(reader).await?.ecdh_public);
        }
        Ok(keys)
    }

    pub async fn lookup(&self, path: &PathName) -> GnsResult<Entry> {
        let (handle, _) = self.dial(&path.user).await?;
        handle.directory().lookup(&self.user, path).await
    }

    pub async fn children(&self, dir: &PathName) -> GnsResult<Vec<Entry>> {
        let (handle, _) = self.dial(&dir.user).await?;
        handle.directory().children(&self.user, dir).await
    }

    /// Lists `dir`'s children whose names match `pattern`, resolved
    /// client-side over one `children` call rather than asking the
    /// directory service to interpret the glob itself.
    pub async fn glob(&self, dir: &PathName, pattern: &str) -> GnsResult<Vec<Entry>> {
        let mut matches: Vec<Entry> = self.children(dir).await?.into_iter().filter(|e| glob_match_element(pattern, e.local_name())).collect();
        matches.sort_by(|a, b| a.local_name().cmp(b.local_name()));
        Ok(matches)
    }

    /// Fetches and reassembles a file's full content, decrypting and
    /// verifying it against the entry's signature.
    pub async fn get(&self, path: &PathName) -> GnsResult<Bytes> {
        let (handle, _) = self.dial(&path.user).await?;
        let entry = handle.directory().lookup(&self.user, path).await?;
        self.read_entry(&handle, &entry).await
    }

    async fn read_entry(&self, handle: &ServiceHandle, entry: &Entry) -> GnsResult<Bytes> {
        let packdata = Packdata::from_slice(&entry.packdata).map_err(pack_err)?;
        let fields = EntryFields { signed_name: entry.signed_name.clone(), time: entry.time, attr: entry.attr, writer: entry.writer };
        let reader = if packdata.packing().encrypts() { Some(self.factotum.as_ref()) } else { None };
        let mut unpacker = BlockUnpacker::open(&fields, &packdata, entry.blocks.clone(), reader).map_err(pack_err)?;

        let mut out = Vec::new();
        while let Some(block) = unpacker.next_block().cloned() {
            let hash = hash_from_reference(&block.location.reference)?;
            let ciphertext = handle.storage().get(&hash).await?;
            out.extend(unpacker.unpack(&block, &ciphertext).map_err(pack_err)?);
        }
        unpacker.finish().map_err(pack_err)?;
        Ok(Bytes::from(out))
    }

    /// Packs `content` under `packing` and writes it at `path`, uploading
    /// each block to `path`'s owner's storage service before signing the
    /// entry. `expected_sequence` pins the optimistic-concurrency check
    /// the directory service enforces (0 for a brand-new entry).
    #[allow(clippy::too_many_arguments)]
    pub async fn put(
        &self,
        path: &PathName,
        packing: Packing,
        content: &[u8],
        readers: &[UserName],
        expected_sequence: u64,
    ) -> GnsResult<Entry> {
        let (handle, home) = self.dial(&path.user).await?;
        let writer = self.factotum.public_identity().signing;
        let reader_keys = self.resolve_readers(readers).await?;

        let time = now_unix();
        let attr = 0;
        let fields = EntryFields { signed_name: path.canonical(), time, attr, writer };
        let mut packer = BlockPacker::new(packing, fields, &reader_keys).map_err(pack_err)?;
        for chunk in content.chunks(DEFAULT_BLOCK_SIZE) {
            let ciphertext = packer.pack(chunk).map_err(pack_err)?;
            let hash = handle.storage().put(Bytes::from(ciphertext)).await?;
            packer.set_location(Location::new(home.clone(), hash.to_hex())).map_err(pack_err)?;
        }
        let (blocks, packdata): (Vec<BlockDescriptor>, Packdata) = packer.close(&self.factotum).map_err(pack_err)?;
        let packdata_bytes = packdata.to_vec().map_err(|e| GnsError::internal(e.to_string()))?;

        handle.directory().put(&self.user, path, path.canonical(), packing, writer, time, attr, blocks, packdata_bytes, expected_sequence).await
    }

    pub async fn make_directory(&self, path: &PathName, packing: Packing) -> GnsResult<Entry> {
        let (handle, _) = self.dial(&path.user).await?;
        let writer = self.factotum.public_identity().signing;
        handle.directory().make_directory(&self.user, path, writer, packing).await
    }

    /// Creates `user`'s root directory. Only meaningful when `user` is
    /// this client's own identity; the directory service itself enforces
    /// who may call it.
    pub async fn make_root(&self, user: &UserName) -> GnsResult<Entry> {
        let (handle, _) = self.dial(user).await?;
        let writer = self.factotum.public_identity().signing;
        handle.directory().make_root(user, writer).await
    }

    pub async fn delete(&self, path: &PathName) -> GnsResult<()> {
        let (handle, _) = self.dial(&path.user).await?;
        handle.directory().delete(&self.user, path).await
    }

    /// Re-wraps an `EncryptedE2e` entry's content key under `readers`,
    /// replacing whoever could previously decrypt it. A reader dropped
    /// from the list loses access to anything written after this call
    /// completes; blocks already fetched, or data re-packed before the
    /// share, are unaffected (see `gns_pack::share`).
    pub async fn share(&self, path: &PathName, readers: &[UserName], expected_sequence: u64) -> GnsResult<Entry> {
        let (handle, _) = self.dial(&path.user).await?;
        let entry = handle.directory().lookup(&self.user, path).await?;
        let packdata = Packdata::from_slice(&entry.packdata).map_err(pack_err)?;
        let reader_keys = self.resolve_readers(readers).await?;
        let reshared = gns_pack::share(&packdata, &reader_keys, &self.factotum).map_err(pack_err)?;
        let packdata_bytes = reshared.to_vec().map_err(|e| GnsError::internal(e.to_string()))?;

        handle
            .directory()
            .put(
                &self.user,
                path,
                entry.signed_name.clone(),
                entry.packing,
                entry.writer,
                entry.time,
                entry.attr,
                entry.blocks.clone(),
                packdata_bytes,
                expected_sequence,
            )
            .await
    }
}
