//! The challenge/signature handshake that establishes a session: a client
//! lacking a token signs a 4-tuple `(user, host, timestamp, direction)` and
//! carries it in the `Gns-Auth-Request` header; the server verifies it
//! against the user's public signing key (looked up via [`AuthLookup`]) and
//! mints a session token. A server signs its own reply the same way when
//! proxying, so the client can confirm it is talking to the expected host.
//!
//! The handshake's signature is Ed25519 rather than ECDSA, matching the
//! rest of this workspace's key material instead of introducing a second
//! curve; likewise the digest is `blake3` rather than SHA-256, since
//! `blake3` is already this workspace's one hash function.

use std::time::{SystemTime, UNIX_EPOCH};

use gns_factotum::Factotum;
use gns_path::UserName;

/// Distinguishes a client authenticating to a server from a server
/// authenticating back to a client, so a captured client request can never
/// be replayed as a valid server reply or vice versa.
const MAGIC_CLIENT_TO_SERVER: &[u8] = b"gns-auth-c2s";
const MAGIC_SERVER_TO_CLIENT: &[u8] = b"gns-auth-s2c";

/// A future timestamp beyond this is logged, not rejected: the signature
/// check is the real authentication, so a clock-skewed node should degrade
/// to noisy rather than locked out.
pub const MAX_CLOCK_SKEW_FUTURE_SECS: u64 = 30;
pub const MAX_CLOCK_SKEW_PAST_SECS: u64 = 45;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub user: UserName,
    pub host: String,
    pub timestamp: u64,
    pub signature: [u8; 64],
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn challenge_digest(magic: &[u8], user: &UserName, host: &str, timestamp: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(magic);
    hasher.update(user.to_string().as_bytes());
    hasher.update(host.as_bytes());
    hasher.update(&timestamp.to_be_bytes());
    *hasher.finalize().as_bytes()
}

impl AuthRequest {
    /// Builds and signs a fresh client-to-server challenge for `host`.
    pub fn sign(factotum: &Factotum, user: UserName, host: String) -> Self {
        let timestamp = now_unix();
        let digest = challenge_digest(MAGIC_CLIENT_TO_SERVER, &user, &host, timestamp);
        let signature = factotum.sign(&digest).to_bytes();
        Self { user, host, timestamp, signature }
    }

    /// Verifies this request's signature under `signing_public`, and reports
    /// whether the timestamp falls inside the accepted clock-skew window
    /// (callers log, rather than reject, a window violation).
    pub fn verify(&self, signing_public: &[u8; 32]) -> Result<bool, anyhow::Error> {
        let digest = challenge_digest(MAGIC_CLIENT_TO_SERVER, &self.user, &self.host, self.timestamp);
        gns_factotum::verify(signing_public, &digest, &self.signature)?;
        Ok(self.within_clock_skew())
    }

    pub fn within_clock_skew(&self) -> bool {
        let now = now_unix();
        if self.timestamp > now {
            self.timestamp - now <= MAX_CLOCK_SKEW_FUTURE_SECS
        } else {
            now - self.timestamp <= MAX_CLOCK_SKEW_PAST_SECS
        }
    }

    /// Comma-joined header value: `user,host,timestamp,hex(signature)`.
    pub fn to_header_value(&self) -> String {
        format!("{},{},{},{}", self.user, self.host, self.timestamp, hex::encode(self.signature))
    }

    pub fn parse_header_value(value: &str) -> Result<Self, super::error::RpcError> {
        use super::error::RpcError;
        let mut parts = value.splitn(4, ',');
        let user = parts.next().ok_or_else(|| RpcError::MalformedHeader("missing user".into()))?;
        let host = parts.next().ok_or_else(|| RpcError::MalformedHeader("missing host".into()))?;
        let timestamp = parts.next().ok_or_else(|| RpcError::MalformedHeader("missing timestamp".into()))?;
        let signature_hex = parts.next().ok_or_else(|| RpcError::MalformedHeader("missing signature".into()))?;

        let user = UserName::parse(user).map_err(|e| RpcError::MalformedHeader(e.to_string()))?;
        let timestamp: u64 = timestamp.parse().map_err(|_| RpcError::MalformedHeader("non-numeric timestamp".into()))?;
        let signature_bytes = hex::decode(signature_hex).map_err(|e| RpcError::MalformedHeader(e.to_string()))?;
        let signature: [u8; 64] =
            signature_bytes.try_into().map_err(|_| RpcError::MalformedHeader("signature is not 64 bytes".into()))?;

        Ok(Self { user, host: host.to_string(), timestamp, signature })
    }
}

/// A server's counter-signed reply when the connection is a proxy on
/// behalf of another endpoint, proving to the client it runs as the
/// expected user before the client accepts the issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAuthReply {
    pub host: String,
    pub timestamp: u64,
    pub signature: [u8; 64],
}

impl ServerAuthReply {
    pub fn sign(factotum: &Factotum, server_user: &UserName, host: String) -> Self {
        let timestamp = now_unix();
        let digest = challenge_digest(MAGIC_SERVER_TO_CLIENT, server_user, &host, timestamp);
        let signature = factotum.sign(&digest).to_bytes();
        Self { host, timestamp, signature }
    }

    pub fn verify(&self, server_user: &UserName, signing_public: &[u8; 32]) -> anyhow::Result<()> {
        let digest = challenge_digest(MAGIC_SERVER_TO_CLIENT, server_user, &self.host, self.timestamp);
        gns_factotum::verify(signing_public, &digest, &self.signature)
    }

    /// Comma-joined header value: `host,timestamp,hex(signature)`.
    pub fn to_header_value(&self) -> String {
        format!("{},{},{}", self.host, self.timestamp, hex::encode(self.signature))
    }

    pub fn parse_header_value(value: &str) -> Result<Self, super::error::RpcError> {
        use super::error::RpcError;
        let mut parts = value.splitn(3, ',');
        let host = parts.next().ok_or_else(|| RpcError::MalformedHeader("missing host".into()))?;
        let timestamp = parts.next().ok_or_else(|| RpcError::MalformedHeader("missing timestamp".into()))?;
        let signature_hex = parts.next().ok_or_else(|| RpcError::MalformedHeader("missing signature".into()))?;

        let timestamp: u64 = timestamp.parse().map_err(|_| RpcError::MalformedHeader("non-numeric timestamp".into()))?;
        let signature_bytes = hex::decode(signature_hex).map_err(|e| RpcError::MalformedHeader(e.to_string()))?;
        let signature: [u8; 64] =
            signature_bytes.try_into().map_err(|_| RpcError::MalformedHeader("signature is not 64 bytes".into()))?;

        Ok(Self { host: host.to_string(), timestamp, signature })
    }
}

/// The server-side hook that resolves a claimed user's signing public key.
/// Concretely backed by `gns_registry` in a running node; kept as a trait
/// here so this crate does not depend on the key registry crate.
#[async_trait::async_trait]
pub trait AuthLookup: Send + Sync {
    async fn signing_key_for(&self, user: &UserName) -> anyhow::Result<Option<[u8; 32]>>;
}
