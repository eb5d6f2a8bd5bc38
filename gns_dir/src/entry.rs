//! The directory entry: the in-memory counterpart of a Directory
//! Entry record, independent of its CBOR wire shape (see [`crate::wire`]).

use gns_pack::BlockDescriptor;

pub const ATTR_PLAIN: u8 = 0;
pub const ATTR_DIRECTORY: u8 = 1 << 0;
pub const ATTR_LINK: u8 = 1 << 1;
pub const ATTR_INCOMPLETE: u8 = 1 << 2;
/// Set on a directory entry whose `blocks` are name-hash-bucketed rather
/// than a single concatenated child list; see [`crate::actor::NUM_BUCKETS`].
pub const ATTR_SHARDED: u8 = 1 << 3;

/// One record in a directory block: a file, a subdirectory, or a link.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Canonical full path this entry was last addressed by.
    pub name: String,
    /// The name under which the signature (if any) was computed; equal to
    /// `name` unless the entry was relocated without re-signing.
    pub signed_name: String,
    pub packing: gns_pack::Packing,
    pub time: u64,
    pub blocks: Vec<BlockDescriptor>,
    /// Opaque entry-level pack-metadata, CBOR-encoded `gns_pack::Packdata`.
    pub packdata: Vec<u8>,
    pub writer: [u8; 32],
    /// Link target, canonical path string; empty when this entry is not a link.
    pub link: String,
    pub attr: u8,
    pub sequence: u64,
}

impl Entry {
    pub fn is_directory(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }

    pub fn is_link(&self) -> bool {
        self.attr & ATTR_LINK != 0
    }

    pub fn is_sharded(&self) -> bool {
        self.attr & ATTR_SHARDED != 0
    }

    pub fn local_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}
