//! Blob location descriptors used by [`crate::store::Store::provide`].
//!
//! A [`BlobLocation`] describes *where* and *how* a storage backend can
//! produce a blob's bytes: inline, over a URL, or wrapped in an encryption
//! or compression transform around another location. CBOR-encoded for wire
//! transport, following the same tagged-variant convention as the rest of
//! the crate's wire types.
//!
//! Key-bearing variants redact their secret fields in `Debug` output.

use minicbor::{CborLen, Decode, Encode};

#[derive(Clone, PartialEq, Eq, Encode, Decode, CborLen)]
#[cbor(flat)]
pub enum BlobLocation {
    #[n(0)]
    IdentityRawBinary(#[n(0)] Vec<u8>),
    #[n(1)]
    Url(#[n(0)] String),
    #[n(0x12)]
    MultihashSha2_256(#[n(0)] [u8; 32]),
    #[n(0x1e)]
    MultihashBlake3(#[n(0)] [u8; 32]),
    #[n(0xe2)]
    EncryptionXChaCha20Poly1305(#[n(0)] EncryptionXChaCha20Poly1305Location),
    #[n(0xc2)]
    CompressionZstd(#[n(0)] Box<BlobLocation>),
}

#[derive(Clone, PartialEq, Eq, Encode, Decode, CborLen)]
pub struct EncryptionXChaCha20Poly1305Location {
    #[n(0)]
    pub key: [u8; 32],
    #[n(1)]
    pub inner: Box<BlobLocation>,
}

impl std::fmt::Debug for EncryptionXChaCha20Poly1305Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionXChaCha20Poly1305Location")
            .field("key", &"[REDACTED]")
            .field("inner", &self.inner)
            .finish()
    }
}

impl std::fmt::Debug for BlobLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobLocation::IdentityRawBinary(b) => {
                f.debug_tuple("IdentityRawBinary").field(&b.len()).finish()
            }
            BlobLocation::Url(u) => f.debug_tuple("Url").field(u).finish(),
            BlobLocation::MultihashSha2_256(h) => {
                f.debug_tuple("MultihashSha2_256").field(h).finish()
            }
            BlobLocation::MultihashBlake3(h) => f.debug_tuple("MultihashBlake3").field(h).finish(),
            BlobLocation::EncryptionXChaCha20Poly1305(inner) => {
                f.debug_tuple("EncryptionXChaCha20Poly1305").field(inner).finish()
            }
            BlobLocation::CompressionZstd(inner) => {
                f.debug_tuple("CompressionZstd").field(inner).finish()
            }
        }
    }
}

impl BlobLocation {
    pub fn to_vec(&self) -> Result<Vec<u8>, minicbor::encode::Error<std::convert::Infallible>> {
        minicbor::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, minicbor::decode::Error> {
        minicbor::decode(bytes)
    }
}
