//! Session persistence.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::store::StateSnapshot;

/// Where session snapshots are kept between a page render and the socket
/// connection that follows it.
pub trait SessionStore: Send + Sync {
    fn load(&self, session: &str) -> Option<StateSnapshot>;

    fn save(&self, session: &str, snapshot: StateSnapshot);

    fn remove(&self, session: &str);

    /// Load and remove in one step. A connection claims its session this way
    /// and saves it back when it closes.
    fn take(&self, session: &str) -> Option<StateSnapshot> {
        let snapshot = self.load(session);
        self.remove(session);
        snapshot
    }
}

/// Allocate a fresh session id.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// How long an unclaimed snapshot is kept by default.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Default cap on stored snapshots.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone)]
struct Saved {
    snapshot: StateSnapshot,
    at: Instant,
}

/// Process-local session store.
///
/// Entries expire `ttl` after they were last saved. When the store is full
/// the oldest entry is evicted to make room.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Saved>,
    ttl: Duration,
    capacity: usize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, saved| saved.at.elapsed() < self.ttl);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!(purged, remaining = self.sessions.len(), "expired sessions purged");
        }
        purged
    }

    fn evict_oldest(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().at)
            .map(|entry| entry.key().clone());
        if let Some(session) = oldest {
            self.sessions.remove(&session);
            debug!(%session, capacity = self.capacity, "session evicted");
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session: &str) -> Option<StateSnapshot> {
        let saved = self.sessions.get(session)?.value().clone();
        if saved.at.elapsed() >= self.ttl {
            self.sessions.remove(session);
            return None;
        }
        Some(saved.snapshot)
    }

    fn save(&self, session: &str, snapshot: StateSnapshot) {
        if !self.sessions.contains_key(session) && self.sessions.len() >= self.capacity {
            self.purge_expired();
            if self.sessions.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        self.sessions.insert(
            session.to_string(),
            Saved {
                snapshot,
                at: Instant::now(),
            },
        );
    }

    fn remove(&self, session: &str) {
        self.sessions.remove(session);
    }

    fn take(&self, session: &str) -> Option<StateSnapshot> {
        let (_, saved) = self.sessions.remove(session)?;
        (saved.at.elapsed() < self.ttl).then_some(saved.snapshot)
    }
}
