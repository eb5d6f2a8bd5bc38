//! Wire-stable error envelope. A `GnsError`'s `Kind` survives the trip
//! across HTTP; the message does too, but the two are independent of the
//! transport's own `reqwest`/`axum` error types, which never cross a
//! process boundary.

use gns_core::{GnsError, Kind};

#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("{0}")]
    Remote(GnsError),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed auth header: {0}")]
    MalformedHeader(String),
    #[error("session unknown or expired")]
    Unauthenticated,
    #[error("signature verification failed")]
    BadSignature,
    #[error("stream frame exceeded the 64 MiB bound")]
    FrameTooLarge,
    #[error("stream ended without a complete frame")]
    Truncated,
}

impl From<GnsError> for RpcError {
    fn from(e: GnsError) -> Self {
        RpcError::Remote(e)
    }
}

impl From<RpcError> for GnsError {
    fn from(e: RpcError) -> Self {
        let message = e.to_string();
        match e {
            RpcError::Remote(inner) => inner,
            RpcError::Unauthenticated => GnsError::permission(message),
            RpcError::BadSignature => GnsError::permission(message),
            RpcError::MalformedHeader(m) => GnsError::invalid(m),
            RpcError::FrameTooLarge | RpcError::Truncated => GnsError::io(message),
            RpcError::Transport(inner) => GnsError::io(inner.to_string()),
        }
    }
}

/// The fixed byte layout an error travels over the wire as: one kind byte
/// (see [`Kind::as_u8`]) followed by the UTF-8 message.
pub fn encode_error(err: &GnsError) -> Vec<u8> {
    let mut out = vec![err.kind.as_u8()];
    out.extend_from_slice(err.message.as_bytes());
    out
}

pub fn decode_error(bytes: &[u8]) -> GnsError {
    match bytes.split_first() {
        Some((&kind_byte, rest)) => GnsError::new(Kind::from_u8(kind_byte), String::from_utf8_lossy(rest).into_owned()),
        None => GnsError::internal("empty error payload"),
    }
}
