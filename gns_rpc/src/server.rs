//! Server-side half of the handshake: given an incoming request's headers,
//! either validate a session token or run the challenge/signature check and
//! mint a new one. `gns_node` calls [`authenticate`] at the top of every
//! authenticated handler; this crate does not itself own an axum `Router`
//! since the set of routes is `gns_node`'s concern (`/api/<Service>/<Method>`
//! dispatch), not this transport's.

use std::sync::Arc;

use axum::http::HeaderMap;
use gns_factotum::Factotum;
use gns_path::UserName;

use crate::auth::{AuthLookup, AuthRequest, ServerAuthReply};
use crate::error::RpcError;
use crate::headers;
use crate::session::{SessionCache, Token};

/// The outcome of a successful [`authenticate`] call: the caller's
/// identity, the token to echo back (new sessions mint one; reused
/// sessions echo the same one), and the server's own proxy counter-reply,
/// when the request named one.
pub struct Authenticated {
    pub user: UserName,
    pub token: Token,
    pub proxy_reply: Option<ServerAuthReply>,
}

pub async fn authenticate(
    headers_in: &HeaderMap,
    sessions: &SessionCache,
    lookup: &dyn AuthLookup,
    server_identity: Option<&Arc<Factotum>>,
) -> Result<Authenticated, RpcError> {
    if let Some(token_header) = headers_in.get(headers::AUTH_TOKEN) {
        let token_hex = token_header.to_str().map_err(|e| RpcError::MalformedHeader(e.to_string()))?;
        let raw = hex::decode(token_hex).map_err(|e| RpcError::MalformedHeader(e.to_string()))?;
        let token: Token = raw.try_into().map_err(|_| RpcError::MalformedHeader("token is not 16 bytes".into()))?;
        let session = sessions.get(&token).ok_or(RpcError::Unauthenticated)?;
        return Ok(Authenticated { user: session.user, token, proxy_reply: None });
    }

    let request_header = headers_in.get(headers::AUTH_REQUEST).ok_or(RpcError::Unauthenticated)?;
    let request_value = request_header.to_str().map_err(|e| RpcError::MalformedHeader(e.to_string()))?;
    let request = AuthRequest::parse_header_value(request_value)?;

    if !request.within_clock_skew() {
        tracing::warn!(user = %request.user, timestamp = request.timestamp, "auth request outside the expected clock-skew window");
    }

    let signing_key = lookup
        .signing_key_for(&request.user)
        .await
        .map_err(|_| RpcError::Unauthenticated)?
        .ok_or(RpcError::Unauthenticated)?;

    request.verify(&signing_key).map_err(|_| RpcError::BadSignature)?;

    let proxied_endpoint = headers_in
        .get(headers::PROXY_REQUEST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let proxy_reply = match (&proxied_endpoint, server_identity) {
        (Some(endpoint), Some(identity)) => Some(ServerAuthReply::sign(identity, &request.user, endpoint.clone())),
        _ => None,
    };

    let token = sessions.insert(request.user.clone(), proxied_endpoint);
    Ok(Authenticated { user: request.user, token, proxy_reply })
}
