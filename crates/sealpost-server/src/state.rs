use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sealpost_crypto::KeyPair;
use sealpost_protocol::PayloadHandler;

use crate::config::ServerConfig;

pub type SessionId = u32;

/// Simple token-bucket rate limiter.
pub struct RateLimiter {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    /// Try to consume one token. Returns true if allowed, false if rate-limited.
    pub fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Bookkeeping for one live connection. The peer binding itself lives in the
/// connection task's `Responder`, not here.
pub struct SessionInfo {
    pub peer_addr: String,
    pub connected_at: Instant,
    /// Fingerprint of the client key bound by the most recent handshake.
    pub peer_fingerprint: Option<String>,
    pub requests: u64,
}

/// The shared server state, designed for concurrent access.
pub struct ServerState {
    /// Server protocol key pair, shared by every session.
    pub keys: Arc<KeyPair>,
    /// Application hook for opened payloads.
    pub handler: Arc<dyn PayloadHandler>,
    /// All active sessions, keyed by session_id.
    pub sessions: DashMap<SessionId, SessionInfo>,
    pub max_sessions: u32,
    pub request_timeout: Duration,
    pub data_rate_per_sec: f64,
    /// Reserved session slots; bumped before a session is inserted.
    active: AtomicUsize,
    next_session_id: AtomicU32,
}

impl ServerState {
    pub fn new(config: &ServerConfig, keys: Arc<KeyPair>, handler: Arc<dyn PayloadHandler>) -> Self {
        Self {
            keys,
            handler,
            sessions: DashMap::new(),
            max_sessions: config.max_sessions,
            request_timeout: config.request_timeout(),
            data_rate_per_sec: config.data_rate_per_sec,
            active: AtomicUsize::new(0),
            next_session_id: AtomicU32::new(1),
        }
    }

    /// Allocate a new unique session ID.
    pub fn next_session_id(&self) -> SessionId {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a new connection. `None` when the server is full.
    pub fn open_session(&self, peer_addr: &str) -> Option<SessionId> {
        let max = self.max_sessions as usize;
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;

        let session_id = self.next_session_id();
        self.sessions.insert(
            session_id,
            SessionInfo {
                peer_addr: peer_addr.to_string(),
                connected_at: Instant::now(),
                peer_fingerprint: None,
                requests: 0,
            },
        );
        Some(session_id)
    }

    /// Count a handled request and remember the currently bound client key.
    pub fn record_request(&self, session_id: SessionId, peer_fingerprint: Option<String>) {
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            session.requests += 1;
            if peer_fingerprint.is_some() {
                session.peer_fingerprint = peer_fingerprint;
            }
        }
    }

    /// Remove a session, returning its bookkeeping.
    pub fn close_session(&self, session_id: SessionId) -> Option<SessionInfo> {
        let (_, info) = self.sessions.remove(&session_id)?;
        self.active.fetch_sub(1, Ordering::AcqRel);
        Some(info)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// A fresh per-session limiter for `data` requests. The bucket holds at
    /// least one token so a sub-1/s rate still admits a first request.
    pub fn data_rate_limiter(&self) -> RateLimiter {
        let rate = self.data_rate_per_sec.max(0.0);
        RateLimiter::new(rate.max(1.0), rate)
    }
}
