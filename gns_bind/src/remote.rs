//! Remote service implementations for the `remote` transport: each call
//! marshals its arguments into a small CBOR request, sends it over
//! `gns_rpc::RpcClient::call` under a fixed `(service, method)` pair, and
//! unmarshals the response. Reuses `gns_dir::wire::EntryWire` for entries
//! rather than inventing a second entry wire shape.
//!
//! The request/response structs and `SERVICE_*` constants are `pub` so
//! that `gns_node`'s route handlers decode the exact same wire shape a
//! client encodes, instead of a hand-copied twin.

use bytes::Bytes;
use gns_core::{Endpoint, GnsError, GnsResult, Hash};
use gns_dir::wire::EntryWire;
use gns_dir::Entry;
use gns_pack::{BlockDescriptor, Packing};
use gns_path::{PathName, UserName};
use minicbor::{CborLen, Decode, Encode};

use crate::traits::{DirectoryService, KeyService, StorageService, UserRecord};

/// Route segment names under `/api/<service>/<method>`. `gns_node` matches
/// its axum routes against these same constants and the request/response
/// structs below, rather than against a second, hand-copied wire shape.
pub const SERVICE_DIRECTORY: &str = "directory";
pub const SERVICE_STORAGE: &str = "storage";
pub const SERVICE_KEY: &str = "key";

fn rpc_err(e: gns_rpc::RpcError) -> GnsError {
    e.into()
}

pub fn encode<T: Encode<()> + CborLen<()>>(value: &T) -> Bytes {
    Bytes::from(minicbor::to_vec(value).expect("encoding a request/response is infallible"))
}

pub fn decode<'a, T: Decode<'a, ()>>(bytes: &'a [u8]) -> GnsResult<T> {
    minicbor::decode(bytes).map_err(|e| GnsError::internal(format!("malformed rpc payload: {e}")))
}

fn entry_from_wire(wire: EntryWire) -> GnsResult<Entry> {
    Entry::try_from(wire).map_err(|e| GnsError::internal(e.to_string()))
}

#[derive(Encode, Decode, CborLen)]
pub struct PathRequest {
    #[n(0)]
    pub caller: String,
    #[n(1)]
    pub path: String,
}

#[derive(Encode, Decode, CborLen)]
pub struct PutRequest {
    #[n(0)]
    pub caller: String,
    #[n(1)]
    pub path: String,
    #[n(2)]
    pub signed_name: String,
    #[n(3)]
    pub packing: u8,
    #[n(4)]
    pub writer: [u8; 32],
    #[n(5)]
    pub blocks: Vec<gns_dir::wire::BlockWire>,
    #[n(6)]
    pub packdata: Vec<u8>,
    #[n(7)]
    pub expected_sequence: u64,
    #[n(8)]
    pub time: u64,
    #[n(9)]
    pub attr: u8,
}

#[derive(Encode, Decode, CborLen)]
pub struct MakeDirectoryRequest {
    #[n(0)]
    pub caller: String,
    #[n(1)]
    pub path: String,
    #[n(2)]
    pub writer: [u8; 32],
    #[n(3)]
    pub packing: u8,
}

#[derive(Encode, Decode, CborLen)]
pub struct MakeRootRequest {
    #[n(0)]
    pub user: String,
    #[n(1)]
    pub writer: [u8; 32],
}

pub struct RemoteDirectory {
    client: std::sync::Arc<gns_rpc::RpcClient>,
}

impl RemoteDirectory {
    pub fn new(client: std::sync::Arc<gns_rpc::RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl DirectoryService for RemoteDirectory {
    async fn lookup(&self, caller: &UserName, path: &PathName) -> GnsResult<Entry> {
        let request = PathRequest { caller: caller.to_string(), path: path.canonical() };
        let response = self.client.call(SERVICE_DIRECTORY, "lookup", encode(&request)).await.map_err(rpc_err)?;
        entry_from_wire(decode(&response)?)
    }

    async fn children(&self, caller: &UserName, dir: &PathName) -> GnsResult<Vec<Entry>> {
        let request = PathRequest { caller: caller.to_string(), path: dir.canonical() };
        let frames = self.client.call_framed(SERVICE_DIRECTORY, "children", encode(&request)).await.map_err(rpc_err)?;
        frames.into_iter().map(|frame| entry_from_wire(decode(&frame)?)).collect()
    }

    async fn read(&self, caller: &UserName, path: &PathName) -> GnsResult<Bytes> {
        let request = PathRequest { caller: caller.to_string(), path: path.canonical() };
        let frames = self.client.call_framed(SERVICE_DIRECTORY, "read", encode(&request)).await.map_err(rpc_err)?;
        let mut out = Vec::new();
        for frame in frames {
            out.extend_from_slice(&frame);
        }
        Ok(Bytes::from(out))
    }

    async fn put(
        &self,
        caller: &UserName,
        path: &PathName,
        signed_name: String,
        packing: Packing,
        writer: [u8; 32],
        time: u64,
        attr: u8,
        blocks: Vec<BlockDescriptor>,
        packdata: Vec<u8>,
        expected_sequence: u64,
    ) -> GnsResult<Entry> {
        let request = PutRequest {
            caller: caller.to_string(),
            path: path.canonical(),
            signed_name,
            packing: packing.as_u8(),
            writer,
            blocks: blocks.iter().map(gns_dir::wire::BlockWire::from).collect(),
            packdata,
            expected_sequence,
            time,
            attr,
        };
        let response = self.client.call(SERVICE_DIRECTORY, "put", encode(&request)).await.map_err(rpc_err)?;
        entry_from_wire(decode(&response)?)
    }

    async fn make_directory(&self, caller: &UserName, path: &PathName, writer: [u8; 32], packing: Packing) -> GnsResult<Entry> {
        let request = MakeDirectoryRequest { caller: caller.to_string(), path: path.canonical(), writer, packing: packing.as_u8() };
        let response = self.client.call(SERVICE_DIRECTORY, "make_directory", encode(&request)).await.map_err(rpc_err)?;
        entry_from_wire(decode(&response)?)
    }

    async fn make_root(&self, user: &UserName, writer: [u8; 32]) -> GnsResult<Entry> {
        let request = MakeRootRequest { user: user.to_string(), writer };
        let response = self.client.call(SERVICE_DIRECTORY, "make_root", encode(&request)).await.map_err(rpc_err)?;
        entry_from_wire(decode(&response)?)
    }

    async fn delete(&self, caller: &UserName, path: &PathName) -> GnsResult<()> {
        let request = PathRequest { caller: caller.to_string(), path: path.canonical() };
        self.client.call(SERVICE_DIRECTORY, "delete", encode(&request)).await.map_err(rpc_err)?;
        Ok(())
    }
}

#[derive(Encode, Decode, CborLen)]
pub struct HashRequest {
    #[n(0)]
    pub hash: [u8; 32],
}

#[derive(Encode, Decode, CborLen)]
pub struct ContainsResponse {
    #[n(0)]
    pub present: bool,
}

pub struct RemoteStorage {
    client: std::sync::Arc<gns_rpc::RpcClient>,
}

impl RemoteStorage {
    pub fn new(client: std::sync::Arc<gns_rpc::RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl StorageService for RemoteStorage {
    async fn get(&self, hash: &Hash) -> GnsResult<Bytes> {
        let request = HashRequest { hash: *hash.as_bytes() };
        let frames = self.client.call_framed(SERVICE_STORAGE, "get", encode(&request)).await.map_err(rpc_err)?;
        let mut out = Vec::new();
        for frame in frames {
            out.extend_from_slice(&frame);
        }
        Ok(Bytes::from(out))
    }

    async fn put(&self, bytes: Bytes) -> GnsResult<Hash> {
        let response = self.client.call(SERVICE_STORAGE, "put", bytes).await.map_err(rpc_err)?;
        let raw: [u8; 32] = response.as_ref().try_into().map_err(|_| GnsError::internal("malformed hash in storage put response"))?;
        Ok(Hash::from(raw))
    }

    async fn contains(&self, hash: &Hash) -> GnsResult<bool> {
        let request = HashRequest { hash: *hash.as_bytes() };
        let response = self.client.call(SERVICE_STORAGE, "contains", encode(&request)).await.map_err(rpc_err)?;
        let decoded: ContainsResponse = decode(&response)?;
        Ok(decoded.present)
    }

    async fn delete(&self, hash: &Hash) -> GnsResult<()> {
        let request = HashRequest { hash: *hash.as_bytes() };
        self.client.call(SERVICE_STORAGE, "delete", encode(&request)).await.map_err(rpc_err)?;
        Ok(())
    }
}

#[derive(Encode, Decode, CborLen)]
pub struct UserRequest {
    #[n(0)]
    pub user: String,
}

#[derive(Encode, Decode, CborLen)]
pub struct UserRecordWire {
    #[n(0)]
    pub signing_public: [u8; 32],
    #[n(1)]
    pub ecdh_public: [u8; 32],
    #[n(2)]
    pub home: String,
}

pub struct RemoteKeys {
    client: std::sync::Arc<gns_rpc::RpcClient>,
}

impl RemoteKeys {
    pub fn new(client: std::sync::Arc<gns_rpc::RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl KeyService for RemoteKeys {
    async fn lookup(&self, user: &UserName) -> GnsResult<UserRecord> {
        let request = UserRequest { user: user.to_string() };
        let response = self.client.call(SERVICE_KEY, "lookup", encode(&request)).await.map_err(rpc_err)?;
        let decoded: UserRecordWire = decode(&response)?;
        let home: Endpoint = decoded.home.parse().map_err(|e| GnsError::internal(format!("malformed home endpoint: {e}")))?;
        Ok(UserRecord { signing_public: decoded.signing_public, ecdh_public: decoded.ecdh_public, home })
    }
}
