//! The single error type shared across every gns crate.
//!
//! A [`GnsError`] always carries a [`Kind`], a human-readable message, and an
//! optional chained cause. Kinds are stable across the wire (see
//! [`Kind::as_u8`]) so that an authenticated RPC response can report the kind
//! without leaking the full cause chain to the caller.

use std::fmt;

/// Stable classification of a failure, independent of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Kind {
    /// A request was malformed: bad path syntax, bad packing metadata, etc.
    Invalid,
    /// The caller lacks the access rights required for the operation.
    Permission,
    /// The named entry does not exist. Also returned, deliberately, for
    /// permission denials against a key registry lookup to avoid confirming
    /// or denying whether an account exists.
    NotExist,
    /// A storage or network I/O failure.
    Io,
    /// Following a link would exceed the resolution depth bound.
    BrokenLink,
    /// An invariant the component itself is responsible for upholding was
    /// violated. Never retried automatically.
    Internal,
    /// Anything else.
    Other,
}

impl Kind {
    pub fn as_u8(self) -> u8 {
        match self {
            Kind::Invalid => 1,
            Kind::Permission => 2,
            Kind::NotExist => 3,
            Kind::Io => 4,
            Kind::BrokenLink => 5,
            Kind::Internal => 6,
            Kind::Other => 7,
        }
    }

    pub fn from_u8(v: u8) -> Kind {
        match v {
            1 => Kind::Invalid,
            2 => Kind::Permission,
            3 => Kind::NotExist,
            4 => Kind::Io,
            5 => Kind::BrokenLink,
            6 => Kind::Internal,
            _ => Kind::Other,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Invalid => "invalid",
            Kind::Permission => "permission",
            Kind::NotExist => "not exist",
            Kind::Io => "I/O",
            Kind::BrokenLink => "broken link",
            Kind::Internal => "internal",
            Kind::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{kind}: {message}")]
pub struct GnsError {
    pub kind: Kind,
    pub message: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl GnsError {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(Kind::Invalid, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(Kind::Permission, message)
    }

    pub fn not_exist(message: impl Into<String>) -> Self {
        Self::new(Kind::NotExist, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(Kind::Io, message)
    }

    pub fn broken_link(message: impl Into<String>) -> Self {
        Self::new(Kind::BrokenLink, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Kind::Internal, message)
    }

    /// Wraps an arbitrary error as [`Kind::NotExist`], discarding the
    /// original cause. Used by key registry lookups so that "account does
    /// not exist" and "backend failure" are indistinguishable to a caller
    /// probing for valid user names.
    pub fn masked_not_exist(message: impl Into<String>) -> Self {
        Self::new(Kind::NotExist, message)
    }
}

pub type GnsResult<T> = std::result::Result<T, GnsError>;
