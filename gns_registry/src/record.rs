//! Wire shape for a published [`gns_bind::UserRecord`]: the inline payload
//! stored under a user's registry record.

use gns_bind::UserRecord;
use gns_core::Endpoint;
use minicbor::{CborLen, Decode, Encode};

#[derive(Encode, Decode, CborLen)]
pub struct UserRecordWire {
    #[n(0)]
    pub signing_public: [u8; 32],
    #[n(1)]
    pub ecdh_public: [u8; 32],
    #[n(2)]
    pub home: String,
}

impl From<&UserRecord> for UserRecordWire {
    fn from(r: &UserRecord) -> Self {
        Self { signing_public: r.signing_public, ecdh_public: r.ecdh_public, home: r.home.to_string() }
    }
}

impl TryFrom<UserRecordWire> for UserRecord {
    type Error = anyhow::Error;

    fn try_from(w: UserRecordWire) -> Result<Self, Self::Error> {
        let home: Endpoint = w.home.parse().map_err(|e| anyhow::anyhow!("malformed home endpoint: {e}"))?;
        Ok(UserRecord { signing_public: w.signing_public, ecdh_public: w.ecdh_public, home })
    }
}
