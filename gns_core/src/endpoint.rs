//! Endpoint and location types: the address vocabulary shared by the
//! binding registry, the directory engine, and the authenticated RPC layer.

use std::fmt;
use std::str::FromStr;

use minicbor::{CborLen, Decode, Encode};
use serde::{Deserialize, Serialize};

/// A transport tag plus the network address it should dial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Encode, Decode, CborLen, Serialize, Deserialize)]
pub enum Endpoint {
    #[n(0)]
    InProcess,
    #[n(1)]
    Remote(#[n(0)] String),
    #[n(2)]
    Unassigned,
}

impl Endpoint {
    pub const DEFAULT_PORT: u16 = 443;
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::InProcess => write!(f, "inprocess"),
            Endpoint::Remote(addr) => write!(f, "remote,{addr}"),
            Endpoint::Unassigned => write!(f, "unassigned"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EndpointParseError {
    #[error("empty endpoint string")]
    Empty,
    #[error("remote endpoint missing host:port")]
    MissingAddress,
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    /// Parses `inprocess`, `remote,host:port`, `unassigned`, or a bare
    /// `host:port` (which implies `remote` with the default port if the
    /// port is missing).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EndpointParseError::Empty);
        }
        if s == "inprocess" {
            return Ok(Endpoint::InProcess);
        }
        if s == "unassigned" {
            return Ok(Endpoint::Unassigned);
        }
        if let Some(rest) = s.strip_prefix("remote,") {
            if rest.is_empty() {
                return Err(EndpointParseError::MissingAddress);
            }
            return Ok(Endpoint::Remote(normalize_address(rest)));
        }
        Ok(Endpoint::Remote(normalize_address(s)))
    }
}

fn normalize_address(addr: &str) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{addr}:{}", Endpoint::DEFAULT_PORT)
    }
}

/// A pair (endpoint, reference) naming where a blob lives and how to name
/// it within that endpoint's storage service.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, CborLen, Serialize, Deserialize)]
pub struct Location {
    #[n(0)]
    pub endpoint: Endpoint,
    #[n(1)]
    pub reference: String,
}

impl Location {
    pub fn new(endpoint: Endpoint, reference: impl Into<String>) -> Self {
        Self {
            endpoint,
            reference: reference.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_forms() {
        assert_eq!("inprocess".parse::<Endpoint>().unwrap(), Endpoint::InProcess);
        assert_eq!("unassigned".parse::<Endpoint>().unwrap(), Endpoint::Unassigned);
        assert_eq!(
            "remote,example.com:1234".parse::<Endpoint>().unwrap(),
            Endpoint::Remote("example.com:1234".to_string())
        );
    }

    #[test]
    fn bare_host_port_defaults_to_remote_443() {
        assert_eq!(
            "example.com".parse::<Endpoint>().unwrap(),
            Endpoint::Remote("example.com:443".to_string())
        );
        assert_eq!(
            "example.com:8443".parse::<Endpoint>().unwrap(),
            Endpoint::Remote("example.com:8443".to_string())
        );
    }

    #[test]
    fn rejects_empty_string() {
        assert_eq!("".parse::<Endpoint>(), Err(EndpointParseError::Empty));
    }
}
