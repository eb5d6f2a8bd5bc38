//! The binding registry: dials `inprocess`/`remote`/`unassigned` endpoints
//! into directory/storage/key service handles, and memoizes them so a
//! client library built on top of this crate shares connections across
//! calls instead of dialing fresh ones.

pub mod handle;
pub mod inprocess;
pub mod registry;
pub mod remote;
pub mod traits;
pub mod unassigned;

pub use handle::{DialContext, ServiceHandle};
pub use registry::{BindingRegistry, Dialer};
pub use traits::{DirectoryService, KeyService, StorageService, UserRecord};

/// Re-exported so `gns_node`'s route handlers decode requests with the
/// exact wire shape `gns_bind`'s own `remote` client encodes them with.
pub use remote::{
    decode, encode, ContainsResponse, HashRequest, MakeDirectoryRequest, MakeRootRequest, PathRequest, PutRequest, UserRecordWire, UserRequest,
    SERVICE_DIRECTORY, SERVICE_KEY, SERVICE_STORAGE,
};
