//! The axum `Router` the authenticated RPC transport is missing: routes
//! incoming `/api/<service>/<method>` requests to the node's locally held
//! directory engine, blob store, and key registry, decoding each request
//! with the exact wire structs `gns_bind::remote`'s client side encodes
//! them with (re-exported from `gns_bind` for this purpose) so the two
//! sides of the wire can never silently diverge.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use gns_bind::{
    decode, encode, ContainsResponse, HashRequest, MakeDirectoryRequest, MakeRootRequest, PathRequest, PutRequest, UserRecordWire, UserRequest,
    SERVICE_DIRECTORY, SERVICE_KEY, SERVICE_STORAGE,
};
use gns_core::{GnsError, GnsResult, Hash};
use gns_dir::wire::EntryWire;
use gns_path::{PathName, UserName};
use gns_rpc::headers;

use crate::GnsNode;

/// Chunk size for frames on a streamed blob/directory-listing response,
/// matching `gns_client`'s own block size for packed content.
const STREAM_CHUNK_SIZE: usize = 256 * 1024;

pub fn router(node: Arc<GnsNode>) -> Router {
    Router::new()
        .route(&format!("/api/{SERVICE_DIRECTORY}/:method"), post(directory_handler))
        .route(&format!("/api/{SERVICE_STORAGE}/:method"), post(storage_handler))
        .route(&format!("/api/{SERVICE_KEY}/:method"), post(key_handler))
        .with_state(node)
}

fn parse_path(raw: &str) -> GnsResult<PathName> {
    PathName::parse(raw).map_err(|e| GnsError::invalid(e.to_string()))
}

fn parse_user(raw: &str) -> GnsResult<UserName> {
    UserName::parse(raw).map_err(|e| GnsError::invalid(e.to_string()))
}

fn store_err(e: anyhow::Error) -> GnsError {
    GnsError::io(e.to_string())
}

fn frame_err(e: gns_rpc::RpcError) -> GnsError {
    GnsError::internal(e.to_string())
}

/// Builds a streaming-authenticated response body: the `"OK"` preamble
/// followed by one length-prefixed frame per item, for methods whose
/// response is an unbounded sequence (directory listings, blob content)
/// rather than a single small struct.
fn frame_body<I: IntoIterator<Item = Vec<u8>>>(items: I) -> GnsResult<Bytes> {
    let mut out = Vec::new();
    out.extend_from_slice(&gns_rpc::framing::encode_preamble());
    for item in items {
        out.extend_from_slice(&gns_rpc::framing::encode_frame(&item).map_err(frame_err)?);
    }
    Ok(Bytes::from(out))
}

fn success_response(token: [u8; 16], proxy_reply: Option<&gns_rpc::auth::ServerAuthReply>, body: Bytes) -> Response {
    let mut response = (StatusCode::OK, [(headers::AUTH_TOKEN, hex::encode(token))], body).into_response();
    if let Some(reply) = proxy_reply {
        if let Ok(value) = axum::http::HeaderValue::from_str(&reply.to_header_value()) {
            response.headers_mut().insert(headers::PROXY_REPLY, value);
        }
    }
    response
}

fn error_response(token: Option<[u8; 16]>, err: GnsError) -> Response {
    let body = gns_rpc::error::encode_error(&err);
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
    if let Some(token) = token {
        if let Ok(value) = axum::http::HeaderValue::from_str(&hex::encode(token)) {
            response.headers_mut().insert(headers::AUTH_TOKEN, value);
        }
    }
    response
}

/// An `authenticate()` failure: the client reads this exact shape (status
/// 500 plus the `gns-auth-error` header present) to decide whether to
/// clear its cached session and retry once, rather than surfacing the
/// error as a remote application failure.
fn auth_error_response(err: gns_rpc::RpcError) -> Response {
    let gns_err: GnsError = err.into();
    let body = gns_rpc::error::encode_error(&gns_err);
    (StatusCode::INTERNAL_SERVER_ERROR, [(headers::AUTH_ERROR, "1")], body).into_response()
}

async fn directory_handler(
    State(node): State<Arc<GnsNode>>,
    Path(method): Path<String>,
    headers_in: HeaderMap,
    body: Bytes,
) -> Response {
    let authenticated = match gns_rpc::authenticate(&headers_in, &node.sessions, node.keys.as_ref(), Some(&node.identity)).await {
        Ok(a) => a,
        Err(e) => return auth_error_response(e),
    };
    match dispatch_directory(&node, &authenticated.user, &method, body).await {
        Ok(body) => success_response(authenticated.token, authenticated.proxy_reply.as_ref(), body),
        Err(e) => error_response(Some(authenticated.token), e),
    }
}

async fn storage_handler(State(node): State<Arc<GnsNode>>, Path(method): Path<String>, headers_in: HeaderMap, body: Bytes) -> Response {
    let authenticated = match gns_rpc::authenticate(&headers_in, &node.sessions, node.keys.as_ref(), Some(&node.identity)).await {
        Ok(a) => a,
        Err(e) => return auth_error_response(e),
    };
    match dispatch_storage(&node, &method, body).await {
        Ok(body) => success_response(authenticated.token, authenticated.proxy_reply.as_ref(), body),
        Err(e) => error_response(Some(authenticated.token), e),
    }
}

async fn key_handler(State(node): State<Arc<GnsNode>>, Path(method): Path<String>, headers_in: HeaderMap, body: Bytes) -> Response {
    let authenticated = match gns_rpc::authenticate(&headers_in, &node.sessions, node.keys.as_ref(), Some(&node.identity)).await {
        Ok(a) => a,
        Err(e) => return auth_error_response(e),
    };
    match dispatch_key(&node, &method, body).await {
        Ok(body) => success_response(authenticated.token, authenticated.proxy_reply.as_ref(), body),
        Err(e) => error_response(Some(authenticated.token), e),
    }
}

async fn dispatch_directory(node: &GnsNode, caller: &UserName, method: &str, body: Bytes) -> GnsResult<Bytes> {
    match method {
        "lookup" => {
            let request: PathRequest = decode(&body)?;
            let entry = node.directory.lookup(caller, &parse_path(&request.path)?).await?;
            Ok(encode(&EntryWire::from(&entry)))
        }
        "children" => {
            let request: PathRequest = decode(&body)?;
            let entries = node.directory.children(caller, &parse_path(&request.path)?).await?;
            frame_body(entries.iter().map(EntryWire::from).map(|w| encode(&w).to_vec()))
        }
        "read" => {
            let request: PathRequest = decode(&body)?;
            let bytes = node.directory.read(caller, &parse_path(&request.path)?).await?;
            frame_body(bytes.chunks(STREAM_CHUNK_SIZE).map(|c| c.to_vec()))
        }
        "put" => {
            let request: PutRequest = decode(&body)?;
            let packing = gns_pack::Packing::from_u8(request.packing).map_err(|e| GnsError::invalid(e.to_string()))?;
            let blocks = request.blocks.into_iter().map(gns_pack::BlockDescriptor::from).collect();
            let entry = node
                .directory
                .put(
                    caller,
                    &parse_path(&request.path)?,
                    request.signed_name,
                    packing,
                    request.writer,
                    request.time,
                    request.attr,
                    blocks,
                    request.packdata,
                    request.expected_sequence,
                )
                .await?;
            Ok(encode(&EntryWire::from(&entry)))
        }
        "make_directory" => {
            let request: MakeDirectoryRequest = decode(&body)?;
            let packing = gns_pack::Packing::from_u8(request.packing).map_err(|e| GnsError::invalid(e.to_string()))?;
            let entry = node.directory.make_directory(caller, &parse_path(&request.path)?, request.writer, packing).await?;
            Ok(encode(&EntryWire::from(&entry)))
        }
        "make_root" => {
            let request: MakeRootRequest = decode(&body)?;
            let entry = node.directory.make_root(&parse_user(&request.user)?, request.writer).await?;
            Ok(encode(&EntryWire::from(&entry)))
        }
        "delete" => {
            let request: PathRequest = decode(&body)?;
            node.directory.delete(caller, &parse_path(&request.path)?).await?;
            Ok(Bytes::new())
        }
        other => Err(GnsError::invalid(format!("unknown directory method: {other}"))),
    }
}

async fn dispatch_storage(node: &GnsNode, method: &str, body: Bytes) -> GnsResult<Bytes> {
    match method {
        "get" => {
            let request: HashRequest = decode(&body)?;
            let bytes = node.storage.get(&Hash::from_bytes(request.hash)).await.map_err(store_err)?;
            frame_body(bytes.chunks(STREAM_CHUNK_SIZE).map(|c| c.to_vec()))
        }
        "put" => {
            let hash = node.storage.put(body).await.map_err(store_err)?;
            Ok(Bytes::copy_from_slice(hash.as_bytes()))
        }
        "contains" => {
            let request: HashRequest = decode(&body)?;
            let present = node.storage.contains(&Hash::from_bytes(request.hash)).await.map_err(store_err)?;
            Ok(encode(&ContainsResponse { present }))
        }
        "delete" => {
            let request: HashRequest = decode(&body)?;
            node.storage.delete(&Hash::from_bytes(request.hash)).await.map_err(store_err)?;
            Ok(Bytes::new())
        }
        other => Err(GnsError::invalid(format!("unknown storage method: {other}"))),
    }
}

async fn dispatch_key(node: &GnsNode, method: &str, body: Bytes) -> GnsResult<Bytes> {
    match method {
        "lookup" => {
            let request: UserRequest = decode(&body)?;
            let record = node.keys.lookup(&parse_user(&request.user)?).await?;
            Ok(encode(&UserRecordWire { signing_public: record.signing_public, ecdh_public: record.ecdh_public, home: record.home.to_string() }))
        }
        other => Err(GnsError::invalid(format!("unknown key method: {other}"))),
    }
}
