//! Client side of the authenticated RPC transport: dials a fixed base URL,
//! attaches a session token when it has a fresh one, runs the
//! challenge/signature handshake when it doesn't, and retries exactly once
//! on an `unauthenticated` response (the server having forgotten the
//! session, e.g. after a restart).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gns_factotum::Factotum;
use gns_path::UserName;
use reqwest::StatusCode;

use crate::auth::{AuthRequest, ServerAuthReply};
use crate::error::{decode_error, RpcError};
use crate::headers;
use crate::session::ClientSessionCache;

const DIAL_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub struct RpcClient {
    http: reqwest::Client,
    base: String,
    user: UserName,
    factotum: Arc<Factotum>,
    sessions: ClientSessionCache,
    /// Set when this client's connection is proxied to a different
    /// endpoint than the one it physically dials.
    proxied_endpoint: Option<String>,
    /// The signing key the proxied host is expected to counter-sign
    /// replies with. Required alongside `proxied_endpoint` for the client
    /// to verify a `PROXY_REPLY` header rather than merely receive one.
    proxied_host_signing_public: Option<[u8; 32]>,
}

impl RpcClient {
    pub fn new(base: impl Into<String>, user: UserName, factotum: Arc<Factotum>) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .connect_timeout(DIAL_TIMEOUT)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base: base.into(),
            user,
            factotum,
            sessions: ClientSessionCache::new(),
            proxied_endpoint: None,
            proxied_host_signing_public: None,
        })
    }

    /// Marks this client as talking through a proxy to `endpoint`, which
    /// signs with `host_signing_public`. Every handshake response is then
    /// required to carry a `PROXY_REPLY` header verifying under that key
    /// before its session token is accepted.
    pub fn proxied_to(mut self, endpoint: impl Into<String>, host_signing_public: [u8; 32]) -> Self {
        self.proxied_endpoint = Some(endpoint.into());
        self.proxied_host_signing_public = Some(host_signing_public);
        self
    }

    fn dialed_host(&self) -> String {
        self.proxied_endpoint.clone().unwrap_or_else(|| self.base.clone())
    }

    fn url(&self, service: &str, method: &str) -> String {
        format!("{}/api/{service}/{method}", self.base.trim_end_matches('/'))
    }

    /// One unary call: `POST /api/<service>/<method>` with `body` as the
    /// opaque request payload, returning the opaque response payload.
    pub async fn call(&self, service: &str, method: &str, body: Bytes) -> Result<Bytes, RpcError> {
        self.call_with_retry(service, method, body, true).await
    }

    /// A streaming-authenticated call: the response body is an
    /// `"OK"`-prefixed sequence of length-prefixed frames rather than a
    /// single opaque payload, used for methods whose response is an
    /// unbounded sequence of items (directory listings, blob content).
    /// Goes through the same handshake/retry/token-caching path as
    /// [`RpcClient::call`]; only the response decoding differs.
    pub async fn call_framed(&self, service: &str, method: &str, body: Bytes) -> Result<Vec<Bytes>, RpcError> {
        let response = self.call_with_retry(service, method, body, true).await?;
        let mut reader = crate::framing::FrameReader::new();
        reader.feed(&response);
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            frames.push(frame);
        }
        reader.finish()?;
        Ok(frames)
    }

    async fn call_with_retry(&self, service: &str, method: &str, body: Bytes, allow_retry: bool) -> Result<Bytes, RpcError> {
        let session = self.sessions.entry(&self.dialed_host());
        let mut request = self.http.post(self.url(service, method)).body(body.clone());

        let handshaking = session.get().filter(|_| session.is_fresh()).is_none();
        if let Some(token) = session.get().filter(|_| session.is_fresh()) {
            request = request.header(headers::AUTH_TOKEN, hex::encode(token));
        } else {
            let challenge = AuthRequest::sign(&self.factotum, self.user.clone(), self.dialed_host());
            request = request.header(headers::AUTH_REQUEST, challenge.to_header_value());
            if let Some(proxied) = &self.proxied_endpoint {
                request = request.header(headers::PROXY_REQUEST, proxied.clone());
            }
        }

        let response = request.send().await?;

        if handshaking && response.status() != StatusCode::INTERNAL_SERVER_ERROR {
            if let Some(signing_public) = &self.proxied_host_signing_public {
                let reply_header = response.headers().get(headers::PROXY_REPLY).ok_or(RpcError::Unauthenticated)?;
                let reply_value = reply_header.to_str().map_err(|e| RpcError::MalformedHeader(e.to_string()))?;
                let reply = ServerAuthReply::parse_header_value(reply_value)?;
                reply.verify(&self.user, signing_public).map_err(|_| RpcError::BadSignature)?;
            }
        }

        if let Some(token_header) = response.headers().get(headers::AUTH_TOKEN) {
            if let Ok(token_hex) = token_header.to_str() {
                if let Ok(raw) = hex::decode(token_hex) {
                    if let Ok(token) = <[u8; 16]>::try_from(raw.as_slice()) {
                        session.set(token, now_plus_session_ttl());
                    }
                }
            }
        }

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR && response.headers().contains_key(headers::AUTH_ERROR) {
            session.clear();
            if allow_retry {
                return Box::pin(self.call_with_retry(service, method, body, false)).await;
            }
            return Err(RpcError::Unauthenticated);
        }

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            let bytes = response.bytes().await?;
            return Err(decode_error(&bytes).into());
        }

        Ok(response.bytes().await?)
    }
}

fn now_plus_session_ttl() -> u64 {
    use crate::session::SESSION_TTL_SECS;
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() + SESSION_TTL_SECS
}
