use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};
use gns_factotum::Factotum;
use gns_path::UserName;
use gns_rpc::headers;
use gns_rpc::{authenticate, AuthLookup, AuthRequest, SessionCache};

struct StaticLookup {
    user: UserName,
    key: [u8; 32],
}

#[async_trait::async_trait]
impl AuthLookup for StaticLookup {
    async fn signing_key_for(&self, user: &UserName) -> anyhow::Result<Option<[u8; 32]>> {
        Ok(if user == &self.user { Some(self.key) } else { None })
    }
}

#[tokio::test]
async fn fresh_auth_request_mints_a_session() {
    let factotum = Factotum::from_root_secret([3u8; 32]);
    let user = UserName::parse("alice@example.com").unwrap();
    let lookup = StaticLookup { user: user.clone(), key: factotum.public_identity().signing };
    let sessions = SessionCache::new();

    let challenge = AuthRequest::sign(&factotum, user.clone(), "gns.example.com".to_string());
    let mut request_headers = HeaderMap::new();
    request_headers.insert(HeaderName::from_static(headers::AUTH_REQUEST), challenge.to_header_value().parse().unwrap());

    let outcome = authenticate(&request_headers, &sessions, &lookup, None).await.unwrap();
    assert_eq!(outcome.user, user);
    assert_eq!(sessions.len(), 1);

    let mut second = HeaderMap::new();
    second.insert(HeaderName::from_static(headers::AUTH_TOKEN), hex::encode(outcome.token).parse().unwrap());
    let reused = authenticate(&second, &sessions, &lookup, None).await.unwrap();
    assert_eq!(reused.user, user);
}

#[tokio::test]
async fn wrong_signer_is_rejected() {
    let signer = Factotum::from_root_secret([3u8; 32]);
    let impostor = Factotum::from_root_secret([9u8; 32]);
    let user = UserName::parse("alice@example.com").unwrap();
    let lookup = StaticLookup { user: user.clone(), key: signer.public_identity().signing };
    let sessions = SessionCache::new();

    let challenge = AuthRequest::sign(&impostor, user.clone(), "gns.example.com".to_string());
    let mut request_headers = HeaderMap::new();
    request_headers.insert(HeaderName::from_static(headers::AUTH_REQUEST), challenge.to_header_value().parse().unwrap());

    assert!(authenticate(&request_headers, &sessions, &lookup, None).await.is_err());
}
