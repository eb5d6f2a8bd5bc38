//! Authenticated RPC transport: a framed request/response protocol over
//! HTTPS, under the fixed URL shape `/api/<Service>/<Method>`, with a
//! challenge/signature handshake establishing a session token, a session
//! cache, proxy authentication, and length-prefixed stream framing for
//! server-to-client streaming responses.
//!
//! Built on `axum` (server side) and `reqwest` (client side) rather than a
//! bespoke QUIC transport, so that `/api/...` endpoints are reachable from
//! any HTTP client during the transition period this system is meant to
//! support.

pub mod auth;
pub mod client;
pub mod error;
pub mod framing;
pub mod headers;
pub mod server;
pub mod session;

pub use auth::{AuthLookup, AuthRequest, ServerAuthReply};
pub use client::RpcClient;
pub use error::RpcError;
pub use server::{authenticate, Authenticated};
pub use session::{Session, SessionCache};
