//! CBOR wire shape for directory entries and blocks.
//!
//! A directory block is a concatenation of marshaled entries, each with
//! stable numeric field identifiers and a bounded unmarshal path, encoded
//! here with `minicbor` derives rather than a hand-rolled varint format.

use gns_core::Location;
use gns_pack::{BlockDescriptor, Packing};
use minicbor::{CborLen, Decode, Encode};

use crate::entry::Entry;

#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error(transparent)]
    Cbor(#[from] minicbor::decode::Error),
    #[error(transparent)]
    Pack(#[from] gns_pack::PackError),
}

#[derive(Encode, Decode, CborLen, Clone, Debug)]
pub struct BlockWire {
    #[n(0)]
    pub offset: u64,
    #[n(1)]
    pub size: u64,
    #[n(2)]
    pub location: Location,
    #[n(3)]
    pub pack_metadata: Vec<u8>,
}

impl From<&BlockDescriptor> for BlockWire {
    fn from(b: &BlockDescriptor) -> Self {
        BlockWire {
            offset: b.offset,
            size: b.size,
            location: b.location.clone(),
            pack_metadata: b.pack_metadata.clone(),
        }
    }
}

impl From<BlockWire> for BlockDescriptor {
    fn from(w: BlockWire) -> Self {
        BlockDescriptor {
            offset: w.offset,
            size: w.size,
            location: w.location,
            pack_metadata: w.pack_metadata,
        }
    }
}

#[derive(Encode, Decode, CborLen, Clone, Debug)]
pub struct EntryWire {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub signed_name: String,
    #[n(2)]
    pub packing: u8,
    #[n(3)]
    pub time: u64,
    #[n(4)]
    pub blocks: Vec<BlockWire>,
    #[n(5)]
    pub packdata: Vec<u8>,
    #[n(6)]
    pub writer: [u8; 32],
    #[n(7)]
    pub link: String,
    #[n(8)]
    pub attr: u8,
    #[n(9)]
    pub sequence: u64,
}

impl From<&Entry> for EntryWire {
    fn from(e: &Entry) -> Self {
        EntryWire {
            name: e.name.clone(),
            signed_name: e.signed_name.clone(),
            packing: e.packing.as_u8(),
            time: e.time,
            blocks: e.blocks.iter().map(BlockWire::from).collect(),
            packdata: e.packdata.clone(),
            writer: e.writer,
            link: e.link.clone(),
            attr: e.attr,
            sequence: e.sequence,
        }
    }
}

impl TryFrom<EntryWire> for Entry {
    type Error = WireError;

    fn try_from(w: EntryWire) -> Result<Self, Self::Error> {
        Ok(Entry {
            name: w.name,
            signed_name: w.signed_name,
            packing: Packing::from_u8(w.packing)?,
            time: w.time,
            blocks: w.blocks.into_iter().map(BlockDescriptor::from).collect(),
            packdata: w.packdata,
            writer: w.writer,
            link: w.link,
            attr: w.attr,
            sequence: w.sequence,
        })
    }
}

/// Encodes a directory's children as a single CBOR block (one shard bucket,
/// or the whole list when unsharded).
pub fn encode_children(children: &[Entry]) -> Vec<u8> {
    let wires: Vec<EntryWire> = children.iter().map(EntryWire::from).collect();
    minicbor::to_vec(&wires).expect("encoding a Vec<EntryWire> is infallible")
}

/// Decodes one shard bucket's worth of children.
pub fn decode_children(bytes: &[u8]) -> Result<Vec<Entry>, WireError> {
    let wires: Vec<EntryWire> = minicbor::decode(bytes)?;
    wires.into_iter().map(Entry::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gns_core::Endpoint;

    fn sample_entry(name: &str) -> Entry {
        Entry {
            name: name.to_string(),
            signed_name: name.to_string(),
            packing: Packing::SignedPlain,
            time: 42,
            blocks: vec![BlockDescriptor {
                offset: 0,
                size: 3,
                location: Location::new(Endpoint::InProcess, "abc"),
                pack_metadata: Vec::new(),
            }],
            packdata: vec![1, 2, 3],
            writer: [9u8; 32],
            link: String::new(),
            attr: 0,
            sequence: 1,
        }
    }

    #[test]
    fn children_round_trip() {
        let children = vec![sample_entry("alice@example.com/a"), sample_entry("alice@example.com/b")];
        let bytes = encode_children(&children);
        let decoded = decode_children(&bytes).unwrap();
        assert_eq!(decoded, children);
    }

    #[test]
    fn empty_children_round_trip() {
        let bytes = encode_children(&[]);
        assert!(decode_children(&bytes).unwrap().is_empty());
    }
}
