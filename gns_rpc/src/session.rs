//! Process-wide session cache. Bounded by eviction on expiry rather than a
//! hard capacity limit — session tokens are 128-bit random values, so the
//! collision-resistance concern a capacity bound would address is already
//! handled by the token's size.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use gns_path::UserName;

pub const SESSION_TTL_SECS: u64 = 20 * 60 * 60;
pub const PROACTIVE_REFRESH_BEFORE_SECS: u64 = 60 * 60;

pub type Token = [u8; 16];

#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserName,
    pub issued_at: u64,
    pub expires_at: u64,
    pub proxied_endpoint: Option<String>,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

pub fn new_token() -> Token {
    let mut token = [0u8; 16];
    getrandom::getrandom(&mut token).expect("platform RNG must be available");
    token
}

/// Server-side: token → session. Client-side: keyed the same way but
/// holding exactly one entry per remote host the client has dialed (see
/// `gns_rpc::client`).
#[derive(Default)]
pub struct SessionCache {
    sessions: DashMap<Token, Session>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    pub fn insert(&self, user: UserName, proxied_endpoint: Option<String>) -> Token {
        let token = new_token();
        let issued_at = now_unix();
        self.sessions.insert(token, Session { user, issued_at, expires_at: issued_at + SESSION_TTL_SECS, proxied_endpoint });
        token
    }

    /// Returns the session if `token` is known and not expired. An expired
    /// entry is removed as a side effect rather than left for a sweep.
    pub fn get(&self, token: &Token) -> Option<Session> {
        let now = now_unix();
        let hit = self.sessions.get(token).map(|s| s.clone());
        match hit {
            Some(session) if session.expires_at > now => Some(session),
            Some(_) => {
                self.sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn invalidate(&self, token: &Token) {
        self.sessions.remove(token);
    }

    pub fn needs_refresh(&self, token: &Token) -> bool {
        match self.sessions.get(token) {
            Some(session) => session.expires_at.saturating_sub(now_unix()) <= PROACTIVE_REFRESH_BEFORE_SECS,
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// A client-side cached token for one remote host.
pub struct ClientSession {
    pub token: std::sync::Mutex<Option<Token>>,
    pub expires_at: AtomicU64,
}

impl ClientSession {
    pub fn empty() -> Self {
        Self { token: std::sync::Mutex::new(None), expires_at: AtomicU64::new(0) }
    }

    /// A cached token counts as fresh only if it has more than the
    /// proactive-refresh window left before expiry; the client re-runs the
    /// handshake ahead of actual expiry rather than racing it.
    pub fn is_fresh(&self) -> bool {
        self.token.lock().expect("session mutex poisoned").is_some()
            && self.expires_at.load(Ordering::Relaxed) > now_unix() + PROACTIVE_REFRESH_BEFORE_SECS
    }

    pub fn set(&self, token: Token, expires_at: u64) {
        *self.token.lock().expect("session mutex poisoned") = Some(token);
        self.expires_at.store(expires_at, Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<Token> {
        *self.token.lock().expect("session mutex poisoned")
    }

    pub fn clear(&self) {
        *self.token.lock().expect("session mutex poisoned") = None;
        self.expires_at.store(0, Ordering::Relaxed);
    }
}

/// Client-side cache, keyed by the dialed host string rather than by
/// token, since the client looks a session up by "who am I talking to".
#[derive(Default)]
pub struct ClientSessionCache {
    by_host: DashMap<String, std::sync::Arc<ClientSession>>,
}

impl ClientSessionCache {
    pub fn new() -> Self {
        Self { by_host: DashMap::new() }
    }

    pub fn entry(&self, host: &str) -> std::sync::Arc<ClientSession> {
        self.by_host.entry(host.to_string()).or_insert_with(|| std::sync::Arc::new(ClientSession::empty())).clone()
    }
}
