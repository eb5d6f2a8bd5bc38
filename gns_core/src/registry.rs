//! Wire types and trait for the key registry / binding-pointer mechanism.
//!
//! The same mutable key-value mechanism backs two different user-facing
//! concepts: the key registry service (user identity -> public keys + home
//! endpoint) and a directory engine's per-user root pointer (see `gns_dir`).
//! Both publish a [`RegistryRecord`] under a [`RegistryKey`] and rely on the
//! same revision-ordered "only the best entry survives" semantics.
//!
//! Eventual consistency tie-break: higher `revision` wins; on a tie, the
//! record with the lexicographically smaller payload hash wins. Using the
//! hash rather than the raw payload lets every peer agree on an ordering
//! even when not all of them hold the inline payload bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::cmp::Ordering;

use crate::hash::Hash;

pub const MAX_INLINE_DATA_SIZE: usize = 1024;
const KEY_SIZE: usize = 32;
const HASH_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 64;

pub type PublicKeyEd25519 = [u8; KEY_SIZE];

/// Identifies the owner/topic of a registry record.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
#[non_exhaustive]
pub enum RegistryKey {
    /// A local, non-cryptographic identifier for process-internal use.
    Local([u8; KEY_SIZE]),
    /// An Ed25519 public key. Records under this key must be signed.
    PublicKeyEd25519(PublicKeyEd25519),
    /// A BLAKE3 hash, used for content-addressed pointer records.
    Blake3HashPin([u8; KEY_SIZE]),
}

impl RegistryKey {
    const LOCAL_ID: u8 = 0;
    const PUBLIC_KEY_ED25519_ID: u8 = 1;
    const BLAKE3_HASH_PIN_ID: u8 = 3;

    pub fn to_bytes(&self) -> (u8, &[u8]) {
        match self {
            RegistryKey::Local(d) => (Self::LOCAL_ID, d),
            RegistryKey::PublicKeyEd25519(d) => (Self::PUBLIC_KEY_ED25519_ID, d),
            RegistryKey::Blake3HashPin(d) => (Self::BLAKE3_HASH_PIN_ID, d),
        }
    }

    pub fn from_bytes(id: u8, data: &[u8]) -> Result<Self, RegistryKeyError> {
        let arr: [u8; KEY_SIZE] = data.try_into().map_err(|_| RegistryKeyError::InvalidLength {
            expected: KEY_SIZE,
            actual: data.len(),
        })?;
        match id {
            Self::LOCAL_ID => Ok(RegistryKey::Local(arr)),
            Self::PUBLIC_KEY_ED25519_ID => Ok(RegistryKey::PublicKeyEd25519(arr)),
            Self::BLAKE3_HASH_PIN_ID => Ok(RegistryKey::Blake3HashPin(arr)),
            _ => Err(RegistryKeyError::UnknownId(id)),
        }
    }

    pub fn signature_len(&self) -> usize {
        match self {
            RegistryKey::Local(_) => 0,
            RegistryKey::PublicKeyEd25519(_) => SIGNATURE_SIZE,
            RegistryKey::Blake3HashPin(_) => 0,
        }
    }

    pub fn requires_signature(&self) -> bool {
        self.signature_len() > 0
    }

    pub fn enforce_inline_limit(&self) -> bool {
        !matches!(self, RegistryKey::Blake3HashPin(_))
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryKeyError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unknown registry key type: {0}")]
    UnknownId(u8),
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum RecordKind {
    /// Append-only: every record is kept.
    Log = 0,
    /// Mutable pointer: only the highest-revision record is kept.
    Pointer = 1,
}

impl TryFrom<u8> for RecordKind {
    type Error = RecordKindError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RecordKind::Log),
            1 => Ok(RecordKind::Pointer),
            _ => Err(RecordKindError(value)),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid record kind: {0}")]
pub struct RecordKindError(pub u8);

/// A single published record: either a log entry or an update to a pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRecord {
    pub kind: RecordKind,
    pub key: RegistryKey,
    pub revision: u64,
    pub hash: Hash,
    pub signature: Box<[u8]>,
    pub data: Option<Bytes>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryRecordError {
    #[error("invalid key: {0}")]
    InvalidKey(#[from] RegistryKeyError),
    #[error("invalid record kind: {0}")]
    InvalidKind(#[from] RecordKindError),
    #[error("signature required for this key type")]
    SignatureRequired,
    #[error("invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength { expected: usize, actual: usize },
    #[error("inline data too large: {size} bytes (max {max})")]
    DataTooLarge { size: usize, max: usize },
    #[error("insufficient bytes for deserialization")]
    InsufficientBytes,
}

impl RegistryRecord {
    pub fn new(
        kind: RecordKind,
        key: RegistryKey,
        revision: u64,
        hash: Hash,
        signature: Box<[u8]>,
        data: Option<Bytes>,
    ) -> Result<Self, RegistryRecordError> {
        if key.requires_signature() && signature.is_empty() {
            return Err(RegistryRecordError::SignatureRequired);
        }
        let expected = key.signature_len();
        if signature.len() != expected {
            return Err(RegistryRecordError::InvalidSignatureLength {
                expected,
                actual: signature.len(),
            });
        }
        if key.enforce_inline_limit()
            && let Some(ref d) = data
            && d.len() > MAX_INLINE_DATA_SIZE
        {
            return Err(RegistryRecordError::DataTooLarge {
                size: d.len(),
                max: MAX_INLINE_DATA_SIZE,
            });
        }
        Ok(Self {
            kind,
            key,
            revision,
            hash,
            signature,
            data,
        })
    }

    /// Wire format: 1 byte kind, 1 byte key type, 32 bytes key, 8 bytes
    /// revision (big-endian), 32 bytes hash, signature, then raw data with
    /// no length prefix (consumes the rest of the buffer).
    pub fn serialize(&self) -> Bytes {
        let (key_id, key_bytes) = self.key.to_bytes();
        let mut buf = BytesMut::with_capacity(
            1 + 1
                + KEY_SIZE
                + 8
                + HASH_SIZE
                + self.signature.len()
                + self.data.as_ref().map_or(0, |d| d.len()),
        );
        buf.put_u8(self.kind as u8);
        buf.put_u8(key_id);
        buf.put_slice(key_bytes);
        buf.put_u64(self.revision);
        buf.put_slice(self.hash.as_ref());
        buf.put_slice(&self.signature);
        if let Some(ref data) = self.data {
            buf.put_slice(data);
        }
        buf.freeze()
    }

    pub fn deserialize(mut bytes: Bytes) -> Result<Self, RegistryRecordError> {
        if bytes.remaining() < 1 + 1 + KEY_SIZE + 8 + HASH_SIZE {
            return Err(RegistryRecordError::InsufficientBytes);
        }
        let kind = RecordKind::try_from(bytes.get_u8())?;
        let key_id = bytes.get_u8();
        let mut key_bytes = [0u8; KEY_SIZE];
        bytes.copy_to_slice(&mut key_bytes);
        let key = RegistryKey::from_bytes(key_id, &key_bytes)?;
        let revision = bytes.get_u64();
        let mut hash_bytes = [0u8; HASH_SIZE];
        bytes.copy_to_slice(&mut hash_bytes);
        let hash = Hash::from(hash_bytes);

        let sig_len = key.signature_len();
        if bytes.remaining() < sig_len {
            return Err(RegistryRecordError::InsufficientBytes);
        }
        let signature = if sig_len > 0 {
            let mut sig = vec![0u8; sig_len];
            bytes.copy_to_slice(&mut sig);
            sig.into_boxed_slice()
        } else {
            Box::new([])
        };
        let data = if bytes.has_remaining() {
            Some(bytes.copy_to_bytes(bytes.remaining()))
        } else {
            None
        };
        Self::new(kind, key, revision, hash, signature, data)
    }

    /// Whether this record should replace `existing` in a pointer-kind store.
    pub fn should_store(&self, existing: Option<&Self>) -> bool {
        match self.kind {
            RecordKind::Log => true,
            RecordKind::Pointer => existing.is_none_or(|e| self > e),
        }
    }
}

impl Ord for RegistryRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.revision
            .cmp(&other.revision)
            .then_with(|| other.hash.cmp(&self.hash))
    }
}

impl PartialOrd for RegistryRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The key registry service contract: a mutable, revision-ordered
/// key-value store for [`RegistryRecord`]s.
#[async_trait::async_trait]
pub trait RegistryApi: Send + Sync {
    async fn get(&self, key: &RegistryKey) -> anyhow::Result<Option<RegistryRecord>>;
    async fn set(&self, record: RegistryRecord) -> anyhow::Result<()>;
    async fn delete(&self, key: &RegistryKey) -> anyhow::Result<()>;
}
