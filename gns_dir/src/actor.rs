//! One actor per user tree: a `DirActor`/`DirActorHandle` design where a
//! `tokio::sync::mpsc` mailbox processes `Lookup`/`Put`/`Delete`/
//! `MakeDirectory`/`Children` messages sequentially, giving the per-user
//! write lock a writer needs "for free" via mailbox serialization rather
//! than an explicit `RwLock<DirSnapshot>`.
//!
//! Large directories shard their children across a fixed number of
//! name-hash buckets (a non-cryptographic `xxhash-rust` choice) instead of
//! one growing CBOR blob. Rather than spawning a child actor per shard,
//! this implementation keeps one actor per *user* and shards only the
//! on-disk block layout of each oversized directory — a full per-subtree
//! actor tree was judged more complexity than this contract requires.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use gns_core::endpoint::{Endpoint, Location};
use gns_core::hash::Hash;
use gns_core::registry::{RecordKind, RegistryKey, RegistryRecord};
use gns_core::{GnsError, GnsResult, Kind};
use gns_factotum::Factotum;
use gns_pack::{BlockPacker, BlockUnpacker, EntryFields, Packdata, Packing};
use gns_path::{PathName, UserName};
use tokio::sync::{mpsc, oneshot};

use crate::context::DirContext;
use crate::entry::{Entry, ATTR_DIRECTORY, ATTR_SHARDED};
use crate::wire::{decode_children, encode_children, EntryWire};

/// Fixed bucket count for sharded directories. Kept deliberately small
/// since this engine shards within one directory's block list rather than
/// spawning one sub-actor per bucket.
pub const NUM_BUCKETS: usize = 16;

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn bucket_of(name: &str) -> usize {
    (xxhash_rust::xxh3::xxh3_64(name.as_bytes()) % NUM_BUCKETS as u64) as usize
}

fn root_registry_key(user: &UserName) -> RegistryKey {
    RegistryKey::Local(*Hash::new(user.to_string().as_bytes()).as_bytes())
}

fn hash_from_reference(reference: &str) -> GnsResult<Hash> {
    let bytes = hex::decode(reference).map_err(|e| GnsError::internal(format!("malformed location reference: {e}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| GnsError::internal("location reference is not a 32-byte hash"))?;
    Ok(Hash::from_bytes(arr))
}

fn io_err(e: anyhow::Error) -> GnsError {
    GnsError::io(e.to_string()).with_source(e)
}

fn pack_err(e: gns_pack::PackError) -> GnsError {
    use gns_pack::PackError::*;
    match e {
        Permission => GnsError::permission(e.to_string()),
        SignatureInvalid | IntegrityError => GnsError::internal(e.to_string()),
        other => GnsError::invalid(other.to_string()),
    }
}

/// Messages the actor mailbox accepts. Every mutating variant carries its
/// own reply channel; the actor answers each in turn before taking the
/// next message, which is exactly the reader/writer-lock-for-free property
/// a mailbox gives for free.
pub enum Op {
    Lookup { path: PathName, reply: oneshot::Sender<GnsResult<Entry>> },
    Children { path: PathName, reply: oneshot::Sender<GnsResult<Vec<Entry>>> },
    FetchBytes { path: PathName, reply: oneshot::Sender<GnsResult<(Bytes, Hash)>> },
    Put { path: PathName, entry: Entry, expected_sequence: u64, reply: oneshot::Sender<GnsResult<Entry>> },
    MakeRoot { writer: [u8; 32], reply: oneshot::Sender<GnsResult<Entry>> },
    MakeDirectory { path: PathName, writer: [u8; 32], packing: Packing, reply: oneshot::Sender<GnsResult<Entry>> },
    Delete { path: PathName, reply: oneshot::Sender<GnsResult<()>> },
}

impl Op {
    fn fail(self, err: GnsError) {
        match self {
            Op::Lookup { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Op::Children { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Op::FetchBytes { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Op::Put { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Op::MakeRoot { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Op::MakeDirectory { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Op::Delete { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// A handle to a running [`DirActor`]'s mailbox. Cheap to clone; every
/// clone shares the same serialized mailbox.
#[derive(Clone)]
pub struct DirActorHandle {
    sender: mpsc::Sender<Op>,
}

impl DirActorHandle {
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<GnsResult<T>>) -> Op) -> GnsResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| GnsError::internal("directory actor mailbox closed"))?;
        rx.await.map_err(|_| GnsError::internal("directory actor dropped the reply channel"))?
    }

    pub async fn lookup(&self, path: PathName) -> GnsResult<Entry> {
        self.call(|reply| Op::Lookup { path, reply }).await
    }

    pub async fn children(&self, path: PathName) -> GnsResult<Vec<Entry>> {
        self.call(|reply| Op::Children { path, reply }).await
    }

    pub async fn fetch_bytes(&self, path: PathName) -> GnsResult<(Bytes, Hash)> {
        self.call(|reply| Op::FetchBytes { path, reply }).await
    }

    pub async fn put(&self, path: PathName, entry: Entry, expected_sequence: u64) -> GnsResult<Entry> {
        self.call(|reply| Op::Put { path, entry, expected_sequence, reply }).await
    }

    pub async fn make_root(&self, writer: [u8; 32]) -> GnsResult<Entry> {
        self.call(|reply| Op::MakeRoot { writer, reply }).await
    }

    pub async fn make_directory(&self, path: PathName, writer: [u8; 32], packing: Packing) -> GnsResult<Entry> {
        self.call(|reply| Op::MakeDirectory { path, writer, packing, reply }).await
    }

    pub async fn delete(&self, path: PathName) -> GnsResult<()> {
        self.call(|reply| Op::Delete { path, reply }).await
    }
}

struct DirActorState {
    user: UserName,
    ctx: Arc<DirContext>,
    factotum: Arc<Factotum>,
    root: Option<Entry>,
    /// Decoded children, keyed by the owning directory's canonical path.
    /// Populated lazily as operations walk the tree; never evicted, since
    /// the actor's lifetime is one user's worth of state ("keep what
    /// you've loaded" is the simplest correct choice here).
    children_cache: HashMap<String, Vec<Entry>>,
}

impl DirActorState {
    async fn handle(&mut self, op: Op) {
        match op {
            Op::Lookup { path, reply } => {
                let _ = reply.send(self.lookup(&path).await);
            }
            Op::Children { path, reply } => {
                let _ = reply.send(self.children(&path).await);
            }
            Op::FetchBytes { path, reply } => {
                let _ = reply.send(self.fetch_bytes(&path).await);
            }
            Op::Put { path, entry, expected_sequence, reply } => {
                let _ = reply.send(self.write_leaf(&path, entry, expected_sequence).await);
            }
            Op::MakeRoot { writer, reply } => {
                let _ = reply.send(self.make_root(writer).await);
            }
            Op::MakeDirectory { path, writer, packing, reply } => {
                let time = now_unix();
                let mut entry = Entry {
                    name: path.canonical(),
                    signed_name: path.canonical(),
                    packing,
                    time,
                    blocks: Vec::new(),
                    packdata: Vec::new(),
                    writer,
                    link: String::new(),
                    attr: ATTR_DIRECTORY,
                    sequence: 0,
                };
                let result = match self.rewrite_dir_record(&mut entry, time).await {
                    Ok(()) => self.write_leaf(&path, entry, 0).await,
                    Err(e) => Err(e),
                };
                if let Ok(ref created) = result {
                    self.children_cache.entry(created.name.clone()).or_default();
                }
                let _ = reply.send(result);
            }
            Op::Delete { path, reply } => {
                let _ = reply.send(self.delete(&path).await);
            }
        }
    }

    async fn ensure_root_loaded(&mut self) -> GnsResult<()> {
        if self.root.is_some() {
            return Ok(());
        }
        let key = root_registry_key(&self.user);
        let record = self
            .ctx
            .root_registry
            .get(&key)
            .await
            .map_err(io_err)?
            .ok_or_else(|| GnsError::not_exist(format!("user {} does not exist", self.user)))?;
        let payload = record
            .data
            .ok_or_else(|| GnsError::internal("root pointer record carries no inline payload"))?;
        let wire: EntryWire = minicbor::decode(&payload).map_err(|e| GnsError::internal(e.to_string()))?;
        let entry = Entry::try_from(wire).map_err(|e| GnsError::internal(e.to_string()))?;
        let children = self.load_children(&entry).await?;
        self.children_cache.insert(entry.name.clone(), children);
        self.root = Some(entry);
        Ok(())
    }

    /// Ensures `dir`'s children are in `children_cache`, recursively loading
    /// every ancestor on the way down. Boxed because it recurses across
    /// `await` points (the same pattern `gns_access::AccessResolver` uses
    /// for group expansion).
    fn ensure_loaded<'a>(&'a mut self, dir: &'a PathName) -> Pin<Box<dyn Future<Output = GnsResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let key = dir.canonical();
            if self.children_cache.contains_key(&key) {
                return Ok(());
            }
            if dir.is_root() {
                return self.ensure_root_loaded().await;
            }
            let parent = dir.parent().expect("non-root path has a parent");
            self.ensure_loaded(&parent).await?;
            let name = dir.last().expect("non-root path has a last element").to_string();
            let dir_entry = self
                .children_cache
                .get(&parent.canonical())
                .and_then(|siblings| siblings.iter().find(|e| e.local_name() == name).cloned())
                .ok_or_else(|| GnsError::not_exist(format!("{dir} does not exist")))?;
            if !dir_entry.is_directory() {
                return Err(GnsError::invalid(format!("{dir} is not a directory")));
            }
            let children = self.load_children(&dir_entry).await?;
            self.children_cache.insert(key, children);
            Ok(())
        })
    }

    async fn lookup(&mut self, path: &PathName) -> GnsResult<Entry> {
        if path.is_root() {
            self.ensure_root_loaded().await?;
            return Ok(self.root.clone().expect("just loaded"));
        }
        let parent = path.parent().expect("non-root path has a parent");
        self.ensure_loaded(&parent).await?;
        let name = path.last().expect("non-root path has a last element");
        self.children_cache
            .get(&parent.canonical())
            .and_then(|siblings| siblings.iter().find(|e| e.local_name() == name).cloned())
            .ok_or_else(|| GnsError::not_exist(format!("{path} does not exist")))
    }

    async fn children(&mut self, dir: &PathName) -> GnsResult<Vec<Entry>> {
        self.ensure_loaded(dir).await?;
        Ok(self.children_cache.get(&dir.canonical()).cloned().unwrap_or_default())
    }

    /// Concatenated, signature-verified cleartext of a plain-packed file's
    /// blocks — the generic block contract from `gns_pack`, distinct from
    /// this crate's own chunked directory-children encoding.
    async fn fetch_bytes(&mut self, path: &PathName) -> GnsResult<(Bytes, Hash)> {
        let entry = self.lookup(path).await?;
        let packdata = Packdata::from_slice(&entry.packdata).map_err(pack_err)?;
        let fields = EntryFields {
            signed_name: entry.signed_name.clone(),
            time: entry.time,
            attr: entry.attr,
            writer: entry.writer,
        };
        let mut unpacker = BlockUnpacker::open(&fields, &packdata, entry.blocks.clone(), None).map_err(pack_err)?;
        let mut out = Vec::new();
        while let Some(block) = unpacker.next_block().cloned() {
            let hash = hash_from_reference(&block.location.reference)?;
            let ciphertext = self.ctx.meta_store.get(&hash).await.map_err(io_err)?;
            out.extend(unpacker.unpack(&block, &ciphertext).map_err(pack_err)?);
        }
        unpacker.finish().map_err(pack_err)?;
        let hash = Hash::new(&out);
        Ok((Bytes::from(out), hash))
    }

    /// Decodes a directory's children from its own entry's blocks, verifying
    /// the entry's signature over the concatenated chunk cleartexts.
    async fn load_children(&self, dir_entry: &Entry) -> GnsResult<Vec<Entry>> {
        if dir_entry.blocks.is_empty() {
            return Ok(Vec::new());
        }
        let packdata = Packdata::from_slice(&dir_entry.packdata).map_err(pack_err)?;
        let fields = EntryFields {
            signed_name: dir_entry.signed_name.clone(),
            time: dir_entry.time,
            attr: dir_entry.attr,
            writer: dir_entry.writer,
        };
        let mut unpacker = BlockUnpacker::open(&fields, &packdata, dir_entry.blocks.clone(), None).map_err(pack_err)?;
        let mut all = Vec::new();
        while let Some(block) = unpacker.next_block().cloned() {
            let hash = hash_from_reference(&block.location.reference)?;
            let ciphertext = self.ctx.meta_store.get(&hash).await.map_err(io_err)?;
            let cleartext = unpacker.unpack(&block, &ciphertext).map_err(pack_err)?;
            all.extend(decode_children(&cleartext).map_err(|e| GnsError::internal(e.to_string()))?);
        }
        unpacker.finish().map_err(pack_err)?;
        Ok(all)
    }

    /// Re-encodes `entry`'s children (sharding if the combined block
    /// exceeds the configured threshold) and re-signs the directory block,
    /// mutating `entry.blocks`/`packdata`/`attr` in place.
    /// Re-encodes and re-signs `entry`'s children under `time`. `time` is
    /// also stamped onto `entry.time` so the stored field always equals
    /// what the signature covers — callers must not take their own,
    /// separate `now_unix()` reading for this entry.
    async fn rewrite_dir_record(&self, entry: &mut Entry, time: u64) -> GnsResult<()> {
        let children = self.children_cache.get(&entry.name).cloned().unwrap_or_default();
        let combined = encode_children(&children);
        let sharded = combined.len() > self.ctx.shard_threshold;

        let chunks: Vec<Vec<Entry>> = if sharded {
            let mut buckets: Vec<Vec<Entry>> = (0..NUM_BUCKETS).map(|_| Vec::new()).collect();
            for child in &children {
                buckets[bucket_of(child.local_name())].push(child.clone());
            }
            buckets
        } else {
            vec![children]
        };

        let attr = ATTR_DIRECTORY | if sharded { ATTR_SHARDED } else { 0 };
        let fields = EntryFields {
            signed_name: entry.name.clone(),
            time,
            attr,
            writer: self.factotum.public_identity().signing,
        };
        let mut packer = BlockPacker::new(Packing::SignedPlain, fields, &[]).map_err(pack_err)?;
        for chunk in &chunks {
            let bytes = encode_children(chunk);
            let ciphertext = packer.pack(&bytes).map_err(pack_err)?;
            let hash = self.ctx.meta_store.put(Bytes::from(ciphertext)).await.map_err(io_err)?;
            packer
                .set_location(Location::new(Endpoint::InProcess, hash.to_hex()))
                .map_err(pack_err)?;
        }
        let (blocks, packdata) = packer.close(&self.factotum).map_err(pack_err)?;

        entry.blocks = blocks;
        entry.packdata = packdata.to_vec().map_err(|e| GnsError::internal(e.to_string()))?;
        entry.attr = attr;
        entry.time = time;
        Ok(())
    }

    async fn persist_root_pointer(&self, root: &Entry) -> GnsResult<()> {
        let wire = EntryWire::from(root);
        let payload = minicbor::to_vec(&wire).map_err(|e| GnsError::internal(e.to_string()))?;
        if payload.len() > gns_core::registry::MAX_INLINE_DATA_SIZE {
            return Err(GnsError::internal(format!(
                "root directory entry for {} exceeds the registry's inline payload limit ({} > {})",
                self.user,
                payload.len(),
                gns_core::registry::MAX_INLINE_DATA_SIZE
            )));
        }
        let key = root_registry_key(&self.user);
        let prior = self.ctx.root_registry.get(&key).await.map_err(io_err)?;
        let revision = prior.map(|r| r.revision + 1).unwrap_or(1);
        let hash = Hash::new(&payload);
        let record = RegistryRecord::new(RecordKind::Pointer, key, revision, hash, Box::new([]), Some(Bytes::from(payload)))
            .map_err(|e| GnsError::internal(e.to_string()))?;
        self.ctx.root_registry.set(record).await.map_err(io_err)
    }

    /// Walks from `start_dir` up to the root, re-encoding and re-storing
    /// every ancestor, then updates the root pointer — the spine rewrite of
    /// invariant 2, held inside the actor's serialized mailbox so it is
    /// atomic from any reader's perspective.
    async fn persist_spine(&mut self, start_dir: &PathName) -> GnsResult<()> {
        let mut current = start_dir.clone();
        loop {
            if current.is_root() {
                let mut root = self.root.clone().ok_or_else(|| GnsError::internal("root not loaded"))?;
                self.rewrite_dir_record(&mut root, now_unix()).await?;
                root.sequence += 1;
                self.persist_root_pointer(&root).await?;
                self.root = Some(root);
                return Ok(());
            }

            let parent = current.parent().expect("non-root path has a parent");
            let name = current.last().expect("non-root path has a last element").to_string();
            self.ensure_loaded(&parent).await?;

            let mut dir_entry = self
                .children_cache
                .get(&parent.canonical())
                .and_then(|siblings| siblings.iter().find(|e| e.local_name() == name).cloned())
                .ok_or_else(|| GnsError::internal(format!("{current} is missing from its own parent's children")))?;

            self.rewrite_dir_record(&mut dir_entry, now_unix()).await?;
            dir_entry.sequence += 1;

            let siblings = self
                .children_cache
                .get_mut(&parent.canonical())
                .expect("just confirmed present above");
            let pos = siblings.iter().position(|e| e.local_name() == name).expect("just confirmed present above");
            siblings[pos] = dir_entry;

            current = parent;
        }
    }

    async fn make_root(&mut self, writer: [u8; 32]) -> GnsResult<Entry> {
        match self.ensure_root_loaded().await {
            Ok(()) => return Ok(self.root.clone().expect("just loaded")),
            Err(e) if e.kind == Kind::NotExist => {}
            Err(e) => return Err(e),
        }

        let name = PathName { user: self.user.clone(), elements: Vec::new() }.canonical();
        let time = now_unix();
        let mut root = Entry {
            name: name.clone(),
            signed_name: name.clone(),
            packing: Packing::SignedPlain,
            time,
            blocks: Vec::new(),
            packdata: Vec::new(),
            writer,
            link: String::new(),
            attr: ATTR_DIRECTORY,
            sequence: 1,
        };
        self.children_cache.insert(name, Vec::new());
        self.rewrite_dir_record(&mut root, time).await?;
        self.persist_root_pointer(&root).await?;
        self.root = Some(root.clone());
        Ok(root)
    }

    async fn write_leaf(&mut self, path: &PathName, mut new_entry: Entry, expected_sequence: u64) -> GnsResult<Entry> {
        if path.is_root() {
            return Err(GnsError::invalid("cannot Put the root directly; use MakeDirectory"));
        }
        let parent = path.parent().expect("non-root path has a parent");
        self.ensure_loaded(&parent).await?;
        let parent_key = parent.canonical();
        let name = path.last().expect("non-root path has a last element").to_string();

        let existing = self
            .children_cache
            .get(&parent_key)
            .and_then(|siblings| siblings.iter().find(|e| e.local_name() == name).cloned());

        if let Some(ref existing) = existing {
            if existing.is_directory() != new_entry.is_directory() {
                return Err(GnsError::invalid(format!(
                    "{path}: cannot overwrite a {} with a {}",
                    if existing.is_directory() { "directory" } else { "file" },
                    if new_entry.is_directory() { "directory" } else { "file" },
                )));
            }
        }

        let current_sequence = existing.as_ref().map(|e| e.sequence).unwrap_or(0);
        if expected_sequence != 0 && expected_sequence != current_sequence {
            return Err(GnsError::invalid(format!(
                "sequence mismatch on {path}: expected {current_sequence}, caller supplied {expected_sequence}"
            )));
        }

        new_entry.name = path.canonical();
        new_entry.sequence = current_sequence + 1;

        {
            let siblings = self.children_cache.get_mut(&parent_key).expect("just ensured loaded above");
            match siblings.iter().position(|e| e.local_name() == name) {
                Some(pos) => siblings[pos] = new_entry.clone(),
                None => siblings.push(new_entry.clone()),
            }
        }
        if new_entry.is_directory() {
            self.children_cache.entry(new_entry.name.clone()).or_default();
        }

        self.persist_spine(&parent).await?;
        Ok(new_entry)
    }

    async fn delete(&mut self, path: &PathName) -> GnsResult<()> {
        if path.is_root() {
            return Err(GnsError::invalid("cannot delete a user root"));
        }
        let parent = path.parent().expect("non-root path has a parent");
        self.ensure_loaded(&parent).await?;
        let parent_key = parent.canonical();
        let name = path.last().expect("non-root path has a last element").to_string();

        let existing = self
            .children_cache
            .get(&parent_key)
            .and_then(|siblings| siblings.iter().find(|e| e.local_name() == name).cloned())
            .ok_or_else(|| GnsError::not_exist(format!("{path} does not exist")))?;

        if existing.is_directory() {
            self.ensure_loaded(path).await?;
            let empty = self.children_cache.get(&path.canonical()).map(|c| c.is_empty()).unwrap_or(true);
            if !empty {
                return Err(GnsError::invalid(format!("{path} is not empty")));
            }
        }

        self.children_cache
            .get_mut(&parent_key)
            .expect("just ensured loaded above")
            .retain(|e| e.local_name() != name);
        self.children_cache.remove(&path.canonical());

        self.persist_spine(&parent).await
    }
}

/// Spawns a new actor for `user`'s tree and returns a handle to its mailbox.
pub fn spawn(user: UserName, ctx: Arc<DirContext>) -> DirActorHandle {
    let (sender, mut receiver) = mpsc::channel::<Op>(64);
    tokio::spawn(async move {
        let factotum = match ctx.signer.factotum_for(&user) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(%user, error = %e, "directory actor could not obtain a signing key");
                let message = e.to_string();
                while let Some(op) = receiver.recv().await {
                    op.fail(GnsError::internal(message.clone()));
                }
                return;
            }
        };
        let mut state = DirActorState {
            user,
            ctx,
            factotum,
            root: None,
            children_cache: HashMap::new(),
        };
        while let Some(op) = receiver.recv().await {
            state.handle(op).await;
        }
    });
    DirActorHandle { sender }
}
