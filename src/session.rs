use crate::state::ConversationState;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_SESSIONS: usize = 10_000;
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Per-session persistence of conversation snapshots.
pub trait SessionStore: Send + Sync {
    /// Returns a fresh state when nothing usable is stored.
    fn load(&self, session_id: &str) -> ConversationState;
    fn save(&self, session_id: &str, state: &ConversationState) -> Result<()>;
    fn clear(&self, session_id: &str);
}

struct Entry {
    snapshot: String,
    touched: Instant,
    // Monotonic use order; ties in `touched` are common on fast machines.
    seq: u64,
}

#[derive(Default)]
struct Snapshots {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

impl Snapshots {
    fn tick(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Keeps serialized snapshots in process memory. Sessions idle for longer
/// than the TTL are dropped, and past capacity the least recently used goes.
pub struct InMemorySessionStore {
    snapshots: Mutex<Snapshots>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_SESSIONS, DEFAULT_IDLE_TTL)
    }
}

impl InMemorySessionStore {
    pub fn with_limits(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            snapshots: Mutex::new(Snapshots::default()),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().entries.len()
    }

    fn evict(&self, snapshots: &mut Snapshots) {
        let before = snapshots.entries.len();
        let ttl = self.idle_ttl;
        snapshots.entries.retain(|_, e| e.touched.elapsed() < ttl);

        while snapshots.entries.len() >= self.max_sessions {
            let oldest = snapshots
                .entries
                .iter()
                .min_by_key(|(_, e)| e.seq)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    snapshots.entries.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - snapshots.entries.len();
        if evicted > 0 {
            log::debug!("Evicted {} idle sessions", evicted);
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, session_id: &str) -> ConversationState {
        let mut snapshots = self.snapshots.lock();
        let seq = snapshots.tick();
        let ttl = self.idle_ttl;
        let Some(entry) = snapshots.entries.get_mut(session_id) else {
            return ConversationState::default();
        };
        if entry.touched.elapsed() >= ttl {
            log::debug!("Session {} expired", session_id);
            snapshots.entries.remove(session_id);
            return ConversationState::default();
        }
        entry.touched = Instant::now();
        entry.seq = seq;
        serde_json::from_str(&entry.snapshot).unwrap_or_else(|e| {
            log::warn!("Discarding unreadable session {}: {}", session_id, e);
            ConversationState::default()
        })
    }

    fn save(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        let raw = serde_json::to_string(state).context("serializing session state")?;
        let mut snapshots = self.snapshots.lock();
        let seq = snapshots.tick();
        if let Some(entry) = snapshots.entries.get_mut(session_id) {
            entry.snapshot = raw;
            entry.touched = Instant::now();
            entry.seq = seq;
            return Ok(());
        }
        self.evict(&mut snapshots);
        snapshots.entries.insert(
            session_id.to_string(),
            Entry {
                snapshot: raw,
                touched: Instant::now(),
                seq,
            },
        );
        Ok(())
    }

    fn clear(&self, session_id: &str) {
        if self.snapshots.lock().entries.remove(session_id).is_some() {
            log::debug!("Cleared session {}", session_id);
        }
    }
}
