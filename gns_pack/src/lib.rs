//! The packing engine: splits entry content into AEAD-protected blocks and
//! manages the per-entry content key's lifecycle (generation, per-reader
//! wrapping, re-sharing, revocation).
//!
//! Four packing variants share one block format:
//!   - `Plain` — no confidentiality, no signature. Used nowhere by default;
//!     kept for completeness and for embedding pre-encrypted foreign data.
//!   - `SignedPlain` — no confidentiality, signed. Access/Group files use
//!     this variant exclusively (any reader who can list a directory must
//!     be able to parse its governing files).
//!   - `EncryptedE2e` — per-block XChaCha20-Poly1305 under a random
//!     per-entry content key, itself wrapped per reader via X25519 ECDH,
//!     signed.
//!   - `Symmetric` — per-block AEAD under a content key supplied by the
//!     caller out of band (server-side encryption of server-owned data, no
//!     reader wrapping), signed.
//!
//! A [`BlockPacker`] is single-writer: callers must call [`BlockPacker::set_location`]
//! between calls to [`BlockPacker::pack`] and must not interleave blocks
//! across concurrent tasks.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::XChaCha20Poly1305;
use gns_core::{Hash, Location};
use gns_factotum::Factotum;
use minicbor::{CborLen, Decode, Encode};
use zeroize::Zeroize;

const NONCE_LEN: usize = 24;

#[derive(thiserror::Error, Debug)]
pub enum PackError {
    #[error("unknown packing tag {0}")]
    UnknownPacking(u8),
    #[error("a block is pending; call set_location before packing the next block")]
    PendingLocation,
    #[error("no block is pending a location")]
    NoPendingBlock,
    #[error("packer is already closed")]
    AlreadyClosed,
    #[error("packer has not been closed")]
    NotClosed,
    #[error("AEAD operation failed (integrity check failed)")]
    IntegrityError,
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("no wrapped content key for this reader")]
    Permission,
    #[error("packdata does not match the expected packing variant")]
    WrongPacking,
    #[error("pack-metadata truncated or malformed")]
    Malformed,
    #[error(transparent)]
    Cbor(#[from] minicbor::decode::Error),
}

/// Selects the packing algorithm for one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    Plain = 0,
    SignedPlain = 1,
    EncryptedE2e = 2,
    Symmetric = 3,
}

impl Packing {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(b: u8) -> Result<Self, PackError> {
        match b {
            0 => Ok(Packing::Plain),
            1 => Ok(Packing::SignedPlain),
            2 => Ok(Packing::EncryptedE2e),
            3 => Ok(Packing::Symmetric),
            other => Err(PackError::UnknownPacking(other)),
        }
    }

    pub fn signs(self) -> bool {
        !matches!(self, Packing::Plain)
    }

    pub fn encrypts(self) -> bool {
        matches!(self, Packing::EncryptedE2e | Packing::Symmetric)
    }
}

/// The stable entry fields covered by the signature (invariant 4): the
/// name under which the signature was computed, modification time,
/// attribute bitset, and writer identity. `Blocks` enters as a hash over
/// the concatenation of per-block cleartext, not the fields themselves.
#[derive(Debug, Clone)]
pub struct EntryFields {
    pub signed_name: String,
    pub time: u64,
    pub attr: u8,
    pub writer: [u8; 32],
}

fn signature_message(fields: &EntryFields, packing: Packing, blocks_content_hash: &Hash) -> Vec<u8> {
    let mut msg = Vec::with_capacity(fields.signed_name.len() + 64);
    msg.extend_from_slice(&(fields.signed_name.len() as u32).to_be_bytes());
    msg.extend_from_slice(fields.signed_name.as_bytes());
    msg.extend_from_slice(&fields.time.to_be_bytes());
    msg.extend_from_slice(blocks_content_hash.as_bytes());
    msg.push(fields.attr);
    msg.push(packing.as_u8());
    msg.extend_from_slice(&fields.writer);
    msg
}

/// One reader's wrapped copy of an entry's content key.
#[derive(Clone, PartialEq, Eq, Encode, Decode, CborLen)]
pub struct WrappedKey {
    #[n(0)]
    pub reader_ecdh_public: [u8; 32],
    #[n(1)]
    pub nonce: [u8; 24],
    #[n(2)]
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedKey")
            .field("reader_ecdh_public", &hex_prefix(&self.reader_ecdh_public))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    data_encoding_hex(&bytes[..bytes.len().min(6)])
}

fn data_encoding_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Entry-level opaque pack-metadata: wrapped keys and signature, shaped
/// per packing variant. Stored verbatim in the directory entry's
/// `Packdata` field; only this crate interprets it.
#[derive(Clone, PartialEq, Eq, Encode, Decode, CborLen)]
#[cbor(flat)]
pub enum Packdata {
    #[n(0)]
    Plain,
    #[n(1)]
    SignedPlain(#[n(0)] SignedMetadata),
    #[n(2)]
    EncryptedE2e(#[n(0)] EncryptedMetadata),
    #[n(3)]
    Symmetric(#[n(0)] SignedMetadata),
}

impl std::fmt::Debug for Packdata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Packdata::Plain => f.write_str("Packdata::Plain"),
            Packdata::SignedPlain(m) => f.debug_tuple("Packdata::SignedPlain").field(m).finish(),
            Packdata::EncryptedE2e(m) => f.debug_tuple("Packdata::EncryptedE2e").field(m).finish(),
            Packdata::Symmetric(m) => f.debug_tuple("Packdata::Symmetric").field(m).finish(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Encode, Decode, CborLen, Debug)]
pub struct SignedMetadata {
    #[n(0)]
    pub signature: [u8; 64],
    /// blake3 hash over the concatenation of this entry's cleartext
    /// blocks, in order. Bound into the signature; re-checked by the
    /// unpacker once all blocks have been decrypted.
    #[n(1)]
    pub blocks_content_hash: [u8; 32],
}

#[derive(Clone, PartialEq, Eq, Encode, Decode, CborLen)]
pub struct EncryptedMetadata {
    #[n(0)]
    pub signature: [u8; 64],
    #[n(1)]
    pub ephemeral_ecdh_public: [u8; 32],
    #[n(2)]
    pub wrapped_keys: Vec<WrappedKey>,
    #[n(3)]
    pub blocks_content_hash: [u8; 32],
}

impl std::fmt::Debug for EncryptedMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedMetadata")
            .field("ephemeral_ecdh_public", &hex_prefix(&self.ephemeral_ecdh_public))
            .field("readers", &self.wrapped_keys.len())
            .finish()
    }
}

impl Packdata {
    pub fn to_vec(&self) -> Result<Vec<u8>, minicbor::encode::Error<std::convert::Infallible>> {
        minicbor::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PackError> {
        Ok(minicbor::decode(bytes)?)
    }

    pub fn packing(&self) -> Packing {
        match self {
            Packdata::Plain => Packing::Plain,
            Packdata::SignedPlain(_) => Packing::SignedPlain,
            Packdata::EncryptedE2e(_) => Packing::EncryptedE2e,
            Packdata::Symmetric(_) => Packing::Symmetric,
        }
    }
}

/// Stable fingerprints of the readers currently able to decrypt an entry
/// packed under [`Packing::EncryptedE2e`]. Used by the directory engine to
/// decide whether a re-share is needed after an Access-file change.
pub fn reader_hashes(packdata: &Packdata) -> Result<Vec<Hash>, PackError> {
    match packdata {
        Packdata::EncryptedE2e(m) => Ok(m
            .wrapped_keys
            .iter()
            .map(|w| Hash::new(w.reader_ecdh_public))
            .collect()),
        _ => Err(PackError::WrongPacking),
    }
}

/// Rebinds an entry's `SignedName` to `new_signed_name` and re-signs,
/// for a rename. `fields` describes the entry's current signed name and
/// its other unchanged fields (`time`, `attr`, `writer`); `factotum` must
/// hold the private key matching `fields.writer`. Block contents and the
/// content-hash commitment are untouched — only the signature moves to
/// cover the new name.
pub fn rename(
    packdata: &Packdata,
    fields: &EntryFields,
    new_signed_name: &str,
    factotum: &Factotum,
) -> Result<Packdata, PackError> {
    let new_fields = EntryFields { signed_name: new_signed_name.to_string(), ..fields.clone() };
    match packdata {
        Packdata::Plain => Ok(Packdata::Plain),
        Packdata::SignedPlain(m) => {
            let hash = Hash::from_bytes(m.blocks_content_hash);
            let msg = signature_message(&new_fields, Packing::SignedPlain, &hash);
            let signature = factotum.sign(&msg).to_bytes();
            Ok(Packdata::SignedPlain(SignedMetadata { signature, blocks_content_hash: m.blocks_content_hash }))
        }
        Packdata::Symmetric(m) => {
            let hash = Hash::from_bytes(m.blocks_content_hash);
            let msg = signature_message(&new_fields, Packing::Symmetric, &hash);
            let signature = factotum.sign(&msg).to_bytes();
            Ok(Packdata::Symmetric(SignedMetadata { signature, blocks_content_hash: m.blocks_content_hash }))
        }
        Packdata::EncryptedE2e(m) => {
            let hash = Hash::from_bytes(m.blocks_content_hash);
            let msg = signature_message(&new_fields, Packing::EncryptedE2e, &hash);
            let signature = factotum.sign(&msg).to_bytes();
            Ok(Packdata::EncryptedE2e(EncryptedMetadata {
                signature,
                ephemeral_ecdh_public: m.ephemeral_ecdh_public,
                wrapped_keys: m.wrapped_keys.clone(),
                blocks_content_hash: m.blocks_content_hash,
            }))
        }
    }
}

fn wrap_content_key(
    content_key: &[u8; 32],
    ephemeral_secret_bytes: &[u8; 32],
    reader_ecdh_public: &[u8; 32],
) -> Result<WrappedKey, PackError> {
    let ephemeral = x25519_dalek::StaticSecret::from(*ephemeral_secret_bytes);
    let shared = ephemeral
        .diffie_hellman(&x25519_dalek::PublicKey::from(*reader_ecdh_public))
        .to_bytes();
    let wrap_key = blake3::derive_key("gns/pack/content-key-wrap", &shared);
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce).map_err(|_| PackError::Malformed)?;
    let cipher = XChaCha20Poly1305::new((&wrap_key).into());
    let ciphertext = cipher
        .encrypt((&nonce).into(), content_key.as_slice())
        .map_err(|_| PackError::IntegrityError)?;
    Ok(WrappedKey {
        reader_ecdh_public: *reader_ecdh_public,
        nonce,
        ciphertext,
    })
}

fn unwrap_content_key(
    wrapped: &WrappedKey,
    ephemeral_ecdh_public: &[u8; 32],
    factotum: &Factotum,
) -> Result<[u8; 32], PackError> {
    let shared = factotum.ecdh_shared_secret(ephemeral_ecdh_public);
    let unwrap_key = blake3::derive_key("gns/pack/content-key-wrap", &shared);
    let cipher = XChaCha20Poly1305::new((&unwrap_key).into());
    let plaintext = cipher
        .decrypt((&wrapped.nonce).into(), wrapped.ciphertext.as_slice())
        .map_err(|_| PackError::Permission)?;
    plaintext.try_into().map_err(|_| PackError::Malformed)
}

/// A block descriptor as it appears in an entry's `Blocks` sequence.
#[derive(Debug, Clone)]
pub struct BlockDescriptor {
    pub offset: u64,
    pub size: u64,
    pub location: Location,
    /// Per-block opaque pack-metadata: the AEAD nonce, or empty for
    /// unencrypted packings.
    pub pack_metadata: Vec<u8>,
}

struct PendingBlock {
    offset: u64,
    size: u64,
    pack_metadata: Vec<u8>,
}

/// Writes one entry's blocks. Single-writer: [`Self::pack`] must be
/// followed by [`Self::set_location`] before the next `pack` call.
pub struct BlockPacker {
    packing: Packing,
    fields: EntryFields,
    content_key: Option<[u8; 32]>,
    ephemeral_secret_bytes: Option<[u8; 32]>,
    readers: Vec<[u8; 32]>,
    hasher: blake3::Hasher,
    blocks: Vec<BlockDescriptor>,
    next_offset: u64,
    pending: Option<PendingBlock>,
    closed: bool,
}

impl BlockPacker {
    /// `readers` is the initial set of ECDH public keys allowed to decrypt
    /// (ignored for `Plain`/`SignedPlain`; required non-empty for
    /// `EncryptedE2e`). For `Symmetric`, pass the caller-supplied content
    /// key via [`Self::with_symmetric_key`] instead of generating one.
    pub fn new(packing: Packing, fields: EntryFields, readers: &[[u8; 32]]) -> Result<Self, PackError> {
        let (content_key, ephemeral_secret_bytes) = match packing {
            Packing::EncryptedE2e => {
                let mut key = [0u8; 32];
                getrandom::getrandom(&mut key).map_err(|_| PackError::Malformed)?;
                let mut ephemeral = [0u8; 32];
                getrandom::getrandom(&mut ephemeral).map_err(|_| PackError::Malformed)?;
                (Some(key), Some(ephemeral))
            }
            Packing::Symmetric => (None, None),
            Packing::Plain | Packing::SignedPlain => (None, None),
        };
        Ok(Self {
            packing,
            fields,
            content_key,
            ephemeral_secret_bytes,
            readers: readers.to_vec(),
            hasher: blake3::Hasher::new(),
            blocks: Vec::new(),
            next_offset: 0,
            pending: None,
            closed: false,
        })
    }

    /// Supplies an out-of-band content key for the `Symmetric` variant.
    pub fn with_symmetric_key(mut self, key: [u8; 32]) -> Self {
        self.content_key = Some(key);
        self
    }

    pub fn pack(&mut self, cleartext: &[u8]) -> Result<Vec<u8>, PackError> {
        if self.closed {
            return Err(PackError::AlreadyClosed);
        }
        if self.pending.is_some() {
            return Err(PackError::PendingLocation);
        }

        let (ciphertext, pack_metadata) = if self.packing.encrypts() {
            let content_key = self.content_key.ok_or(PackError::Malformed)?;
            let mut nonce = [0u8; NONCE_LEN];
            getrandom::getrandom(&mut nonce).map_err(|_| PackError::Malformed)?;
            let cipher = XChaCha20Poly1305::new((&content_key).into());
            let ciphertext = cipher
                .encrypt((&nonce).into(), cleartext)
                .map_err(|_| PackError::IntegrityError)?;
            (ciphertext, nonce.to_vec())
        } else {
            (cleartext.to_vec(), Vec::new())
        };

        self.hasher.update(cleartext);
        self.pending = Some(PendingBlock {
            offset: self.next_offset,
            size: cleartext.len() as u64,
            pack_metadata,
        });
        Ok(ciphertext)
    }

    pub fn set_location(&mut self, location: Location) -> Result<(), PackError> {
        let pending = self.pending.take().ok_or(PackError::NoPendingBlock)?;
        self.next_offset += pending.size;
        self.blocks.push(BlockDescriptor {
            offset: pending.offset,
            size: pending.size,
            location,
            pack_metadata: pending.pack_metadata,
        });
        Ok(())
    }

    /// Finalizes the signature and returns the completed blocks plus
    /// entry-level pack-metadata. The writer's factotum must match
    /// `fields.writer`.
    pub fn close(mut self, factotum: &Factotum) -> Result<(Vec<BlockDescriptor>, Packdata), PackError> {
        if self.pending.is_some() {
            return Err(PackError::PendingLocation);
        }
        if self.closed {
            return Err(PackError::AlreadyClosed);
        }
        self.closed = true;

        let blocks_content_hash = Hash::from_bytes(*self.hasher.finalize().as_bytes());
        let packdata = match self.packing {
            Packing::Plain => Packdata::Plain,
            Packing::SignedPlain => {
                let msg = signature_message(&self.fields, self.packing, &blocks_content_hash);
                let signature = factotum.sign(&msg).to_bytes();
                Packdata::SignedPlain(SignedMetadata {
                    signature,
                    blocks_content_hash: *blocks_content_hash.as_bytes(),
                })
            }
            Packing::Symmetric => {
                let msg = signature_message(&self.fields, self.packing, &blocks_content_hash);
                let signature = factotum.sign(&msg).to_bytes();
                Packdata::Symmetric(SignedMetadata {
                    signature,
                    blocks_content_hash: *blocks_content_hash.as_bytes(),
                })
            }
            Packing::EncryptedE2e => {
                let msg = signature_message(&self.fields, self.packing, &blocks_content_hash);
                let signature = factotum.sign(&msg).to_bytes();
                let content_key = self.content_key.ok_or(PackError::Malformed)?;
                let ephemeral_secret_bytes = self.ephemeral_secret_bytes.ok_or(PackError::Malformed)?;
                let ephemeral_ecdh_public = x25519_dalek::PublicKey::from(
                    &x25519_dalek::StaticSecret::from(ephemeral_secret_bytes),
                )
                .to_bytes();
                let wrapped_keys = self
                    .readers
                    .iter()
                    .map(|reader| wrap_content_key(&content_key, &ephemeral_secret_bytes, reader))
                    .collect::<Result<Vec<_>, _>>()?;
                Packdata::EncryptedE2e(EncryptedMetadata {
                    signature,
                    ephemeral_ecdh_public,
                    wrapped_keys,
                    blocks_content_hash: *blocks_content_hash.as_bytes(),
                })
            }
        };

        if let Some(ref mut key) = self.content_key {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.ephemeral_secret_bytes {
            secret.zeroize();
        }

        Ok((std::mem::take(&mut self.blocks), packdata))
    }
}

/// Re-wraps an `EncryptedE2e` entry's content key under a new reader set.
/// `unwrap_via` must already hold a wrapped copy (ordinarily the writer's
/// own factotum). Revocation is achieved by calling this with a `readers`
/// list that omits the reader to remove — the removed reader has no
/// wrapped copy in the result and fails with [`PackError::Permission`] on
/// subsequent `Get`s of data packed after the re-share.
pub fn share(
    packdata: &Packdata,
    readers: &[[u8; 32]],
    unwrap_via: &Factotum,
) -> Result<Packdata, PackError> {
    let Packdata::EncryptedE2e(metadata) = packdata else {
        return Err(PackError::WrongPacking);
    };
    let own_public = unwrap_via.public_identity().ecdh;
    let own_wrapped = metadata
        .wrapped_keys
        .iter()
        .find(|w| w.reader_ecdh_public == own_public)
        .ok_or(PackError::Permission)?;
    let mut content_key = unwrap_content_key(own_wrapped, &metadata.ephemeral_ecdh_public, unwrap_via)?;

    let mut new_ephemeral_secret_bytes = [0u8; 32];
    getrandom::getrandom(&mut new_ephemeral_secret_bytes).map_err(|_| PackError::Malformed)?;
    let new_ephemeral_public =
        x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from(new_ephemeral_secret_bytes)).to_bytes();

    let wrapped_keys = readers
        .iter()
        .map(|reader| wrap_content_key(&content_key, &new_ephemeral_secret_bytes, reader))
        .collect::<Result<Vec<_>, _>>()?;

    content_key.zeroize();

    Ok(Packdata::EncryptedE2e(EncryptedMetadata {
        signature: metadata.signature,
        ephemeral_ecdh_public: new_ephemeral_public,
        wrapped_keys,
        blocks_content_hash: metadata.blocks_content_hash,
    }))
}

/// Reads one entry's blocks, verifying the signature on construction and
/// decrypting/authenticating each block on demand.
pub struct BlockUnpacker {
    packing: Packing,
    content_key: Option<[u8; 32]>,
    expected_blocks_content_hash: Hash,
    hasher: blake3::Hasher,
    blocks: Vec<BlockDescriptor>,
    cursor: usize,
}

impl BlockUnpacker {
    /// Verifies the signature against the entry's stored content-hash
    /// commitment and recovers the content key for encrypted variants.
    /// The commitment itself is re-checked incrementally as blocks are
    /// unpacked — see [`Self::unpack`] and [`Self::finish`].
    pub fn open(
        fields: &EntryFields,
        packdata: &Packdata,
        blocks: Vec<BlockDescriptor>,
        reader: Option<&Factotum>,
    ) -> Result<Self, PackError> {
        let packing = packdata.packing();

        let (signature, expected_blocks_content_hash) = match packdata {
            Packdata::Plain => (None, Hash::EMPTY),
            Packdata::SignedPlain(m) => (Some(m.signature), Hash::from_bytes(m.blocks_content_hash)),
            Packdata::Symmetric(m) => (Some(m.signature), Hash::from_bytes(m.blocks_content_hash)),
            Packdata::EncryptedE2e(m) => (Some(m.signature), Hash::from_bytes(m.blocks_content_hash)),
        };
        if let Some(signature) = signature {
            let msg = signature_message(fields, packing, &expected_blocks_content_hash);
            gns_factotum::verify(&fields.writer, &msg, &signature).map_err(|_| PackError::SignatureInvalid)?;
        }

        let content_key = match packdata {
            Packdata::Plain | Packdata::SignedPlain => None,
            Packdata::Symmetric(_) => None,
            Packdata::EncryptedE2e(m) => {
                let reader = reader.ok_or(PackError::Permission)?;
                let own_public = reader.public_identity().ecdh;
                let wrapped = m
                    .wrapped_keys
                    .iter()
                    .find(|w| w.reader_ecdh_public == own_public)
                    .ok_or(PackError::Permission)?;
                Some(unwrap_content_key(wrapped, &m.ephemeral_ecdh_public, reader)?)
            }
        };

        Ok(Self {
            packing,
            content_key,
            expected_blocks_content_hash,
            hasher: blake3::Hasher::new(),
            blocks,
            cursor: 0,
        })
    }

    /// For `Symmetric` entries, the content key is supplied directly
    /// rather than recovered via ECDH.
    pub fn with_symmetric_key(mut self, key: [u8; 32]) -> Self {
        self.content_key = Some(key);
        self
    }

    pub fn next_block(&mut self) -> Option<&BlockDescriptor> {
        let block = self.blocks.get(self.cursor)?;
        self.cursor += 1;
        Some(block)
    }

    pub fn seek_block(&mut self, n: usize) -> Option<&BlockDescriptor> {
        self.cursor = n;
        self.blocks.get(n)
    }

    pub fn unpack(&mut self, block: &BlockDescriptor, ciphertext: &[u8]) -> Result<Vec<u8>, PackError> {
        let cleartext = if !self.packing.encrypts() {
            ciphertext.to_vec()
        } else {
            let content_key = self.content_key.ok_or(PackError::Permission)?;
            let nonce: [u8; NONCE_LEN] = block
                .pack_metadata
                .as_slice()
                .try_into()
                .map_err(|_| PackError::Malformed)?;
            let cipher = XChaCha20Poly1305::new((&content_key).into());
            cipher
                .decrypt((&nonce).into(), ciphertext)
                .map_err(|_| PackError::IntegrityError)?
        };
        self.hasher.update(&cleartext);
        Ok(cleartext)
    }

    /// Must be called after every block has been passed through
    /// [`Self::unpack`]; confirms the entry's blocks were not substituted
    /// or truncated relative to what the writer signed.
    pub fn finish(&self) -> Result<(), PackError> {
        if self.packing == Packing::Plain {
            return Ok(());
        }
        let actual = Hash::from_bytes(*self.hasher.finalize().as_bytes());
        if actual == self.expected_blocks_content_hash {
            Ok(())
        } else {
            Err(PackError::IntegrityError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gns_core::Endpoint;

    fn loc(i: u64) -> Location {
        Location::new(Endpoint::InProcess, format!("block-{i}"))
    }

    #[test]
    fn signed_plain_round_trip() {
        let factotum = Factotum::from_root_secret([7u8; 32]);
        let writer = factotum.public_identity().signing;
        let fields = EntryFields {
            signed_name: "alice@example.com/Access".into(),
            time: 1000,
            attr: 0,
            writer,
        };

        let mut packer = BlockPacker::new(Packing::SignedPlain, fields.clone(), &[]).unwrap();
        let ciphertext = packer.pack(b"read: bob@example.com").unwrap();
        packer.set_location(loc(0)).unwrap();
        let (blocks, packdata) = packer.close(&factotum).unwrap();

        let mut unpacker = BlockUnpacker::open(&fields, &packdata, blocks, None).unwrap();
        let block = unpacker.next_block().unwrap().clone();
        let cleartext = unpacker.unpack(&block, &ciphertext).unwrap();
        assert_eq!(cleartext, b"read: bob@example.com");
        unpacker.finish().unwrap();
    }

    #[test]
    fn e2e_share_and_revoke() {
        let writer_factotum = Factotum::from_root_secret([1u8; 32]);
        let reader_factotum = Factotum::from_root_secret([2u8; 32]);
        let third_factotum = Factotum::from_root_secret([3u8; 32]);
        let writer = writer_factotum.public_identity().signing;

        let fields = EntryFields {
            signed_name: "alice@example.com/secret.txt".into(),
            time: 2000,
            attr: 0,
            writer,
        };

        let readers = [reader_factotum.public_identity().ecdh];
        let mut packer = BlockPacker::new(Packing::EncryptedE2e, fields.clone(), &readers).unwrap();
        let ciphertext = packer.pack(b"top secret").unwrap();
        packer.set_location(loc(0)).unwrap();
        let (blocks, packdata) = packer.close(&writer_factotum).unwrap();

        let mut unpacker =
            BlockUnpacker::open(&fields, &packdata, blocks.clone(), Some(&reader_factotum)).unwrap();
        let block = unpacker.next_block().unwrap().clone();
        let cleartext = unpacker.unpack(&block, &ciphertext).unwrap();
        assert_eq!(cleartext, b"top secret");
        unpacker.finish().unwrap();

        assert!(BlockUnpacker::open(&fields, &packdata, blocks.clone(), Some(&third_factotum)).is_err());

        let new_readers = [third_factotum.public_identity().ecdh];
        let reshared = share(&packdata, &new_readers, &writer_factotum).unwrap();

        assert!(BlockUnpacker::open(&fields, &reshared, blocks.clone(), Some(&reader_factotum)).is_err());
        let mut unpacker2 = BlockUnpacker::open(&fields, &reshared, blocks, Some(&third_factotum)).unwrap();
        let block2 = unpacker2.next_block().unwrap().clone();
        let cleartext2 = unpacker2.unpack(&block2, &ciphertext).unwrap();
        assert_eq!(cleartext2, b"top secret");
    }

    #[test]
    fn tampered_ciphertext_fails_integrity_check() {
        let factotum = Factotum::from_root_secret([5u8; 32]);
        let writer = factotum.public_identity().signing;
        let fields = EntryFields {
            signed_name: "alice@example.com/file.txt".into(),
            time: 3000,
            attr: 0,
            writer,
        };
        let readers = [factotum.public_identity().ecdh];
        let mut packer = BlockPacker::new(Packing::EncryptedE2e, fields.clone(), &readers).unwrap();
        let mut ciphertext = packer.pack(b"hello").unwrap();
        packer.set_location(loc(0)).unwrap();
        let (blocks, packdata) = packer.close(&factotum).unwrap();

        ciphertext[0] ^= 0xff;
        let mut unpacker = BlockUnpacker::open(&fields, &packdata, blocks, Some(&factotum)).unwrap();
        let block = unpacker.next_block().unwrap().clone();
        assert!(matches!(unpacker.unpack(&block, &ciphertext), Err(PackError::IntegrityError)));
    }

    #[test]
    fn rename_rebinds_signed_name_and_reverifies() {
        let factotum = Factotum::from_root_secret([6u8; 32]);
        let writer = factotum.public_identity().signing;
        let fields = EntryFields {
            signed_name: "alice@example.com/old.txt".into(),
            time: 1500,
            attr: 0,
            writer,
        };

        let mut packer = BlockPacker::new(Packing::SignedPlain, fields.clone(), &[]).unwrap();
        let ciphertext = packer.pack(b"hello").unwrap();
        packer.set_location(loc(0)).unwrap();
        let (blocks, packdata) = packer.close(&factotum).unwrap();

        assert!(BlockUnpacker::open(&fields, &packdata, blocks.clone(), None).is_ok());

        let renamed = rename(&packdata, &fields, "alice@example.com/new.txt", &factotum).unwrap();

        assert!(BlockUnpacker::open(&fields, &renamed, blocks.clone(), None).is_err());

        let new_fields = EntryFields { signed_name: "alice@example.com/new.txt".into(), ..fields };
        let mut unpacker = BlockUnpacker::open(&new_fields, &renamed, blocks, None).unwrap();
        let block = unpacker.next_block().unwrap().clone();
        let cleartext = unpacker.unpack(&block, &ciphertext).unwrap();
        assert_eq!(cleartext, b"hello");
        unpacker.finish().unwrap();
    }

    #[test]
    fn reader_hashes_lists_wrapped_readers() {
        let writer_factotum = Factotum::from_root_secret([8u8; 32]);
        let reader_factotum = Factotum::from_root_secret([9u8; 32]);
        let writer = writer_factotum.public_identity().signing;
        let fields = EntryFields {
            signed_name: "alice@example.com/file.txt".into(),
            time: 4000,
            attr: 0,
            writer,
        };
        let readers = [reader_factotum.public_identity().ecdh];
        let mut packer = BlockPacker::new(Packing::EncryptedE2e, fields, &readers).unwrap();
        packer.pack(b"x").unwrap();
        packer.set_location(loc(0)).unwrap();
        let (_, packdata) = packer.close(&writer_factotum).unwrap();

        let hashes = reader_hashes(&packdata).unwrap();
        assert_eq!(hashes, vec![Hash::new(reader_factotum.public_identity().ecdh)]);
    }
}
