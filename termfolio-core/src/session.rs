//! Session-scoped conversation memory
//!
//! Maps a sanitized session id to its chat history. Sessions are created
//! lazily, touched on every read, and reaped two ways: an idle timeout sweep
//! and an emergency eviction that halves the population when the hard cap is
//! exceeded. Nothing is persisted; restart loses everything by design.
//!
//! History is append-only while a session lives. Prompt building reads only
//! the most recent N turns but older turns stay in storage.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::SessionConfig;
use crate::types::ChatTurn;

struct Session {
    history: Vec<ChatTurn>,
    last_access: Instant,
}

/// In-memory session store, constructed once and injected into the handler.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
            max_sessions,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            config.max_sessions,
        )
    }

    /// Return the last `n` turns for `session_id`, creating the session if
    /// it does not exist. Touches the session's last-access time.
    pub fn recent(&self, session_id: &str, n: usize) -> Vec<ChatTurn> {
        self.recent_at(session_id, n, Instant::now())
    }

    /// Append one completed turn: the user message, then the assistant
    /// reply. Touches the session's last-access time.
    pub fn append_turn(&self, session_id: &str, user: String, assistant: String) {
        self.append_turn_at(session_id, user, assistant, Instant::now())
    }

    /// Remove idle sessions, then halve the population if it still exceeds
    /// the cap (oldest last-access first).
    pub fn sweep(&self) {
        self.sweep_at(Instant::now())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Total stored turns for a session, 0 if absent. Does not touch it.
    pub fn history_len(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .get(session_id)
            .map(|s| s.history.len())
            .unwrap_or(0)
    }

    fn recent_at(&self, session_id: &str, n: usize, now: Instant) -> Vec<ChatTurn> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                history: Vec::new(),
                last_access: now,
            });
        session.last_access = now;

        let start = session.history.len().saturating_sub(n);
        session.history[start..].to_vec()
    }

    fn append_turn_at(&self, session_id: &str, user: String, assistant: String, now: Instant) {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                history: Vec::new(),
                last_access: now,
            });
        session.history.push(ChatTurn::user(user));
        session.history.push(ChatTurn::assistant(assistant));
        session.last_access = now;
    }

    fn sweep_at(&self, now: Instant) {
        let mut sessions = self.sessions.lock();

        let before = sessions.len();
        sessions.retain(|_, s| now.saturating_duration_since(s.last_access) <= self.timeout);
        let idle_removed = before - sessions.len();

        // Pressure-relief valve: the idle timer alone cannot bound growth
        // under bursty traffic
        let mut evicted = 0;
        if sessions.len() > self.max_sessions {
            let mut by_age: Vec<(String, Instant)> = sessions
                .iter()
                .map(|(id, s)| (id.clone(), s.last_access))
                .collect();
            by_age.sort_by_key(|(_, last_access)| *last_access);

            evicted = by_age.len() / 2;
            for (id, _) in by_age.into_iter().take(evicted) {
                sessions.remove(&id);
            }
        }

        if idle_removed > 0 || evicted > 0 {
            tracing::info!(idle_removed, evicted, live = sessions.len(), "Session sweep");
        }
    }
}
