//! HTTP header names for the authenticated RPC protocol. Named for this
//! system rather than carried over from the design this was adapted from.

pub const AUTH_TOKEN: &str = "gns-auth-token";
pub const AUTH_REQUEST: &str = "gns-auth-request";
pub const AUTH_ERROR: &str = "gns-auth-error";
pub const PROXY_REQUEST: &str = "gns-proxy-request";
/// Carries the server's counter-signed [`crate::auth::ServerAuthReply`]
/// back to the client when a request named a `PROXY_REQUEST` endpoint —
/// present only on the handshake response that mints a fresh session.
pub const PROXY_REPLY: &str = "gns-proxy-reply";

/// Two-byte preamble a streaming-authenticated response begins with,
/// before the first length-prefixed frame.
pub const STREAM_PREAMBLE: &[u8; 2] = b"OK";

/// A single stream frame's length prefix must not claim more than this.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;
