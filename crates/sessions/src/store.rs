//! The Session Store: an in-memory, concurrency-safe keyed store of
//! run state. A single writer at a time per `session_id`; any reader
//! observes a consistent snapshot. Active sessions are tracked in a
//! separate set so `is_active` is constant-time.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::Serialize;

use dp_domain::error::ErrorKind;
use dp_domain::session::{Session, SessionStatus, Source, Step};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub active: usize,
    pub terminal: usize,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    active: RwLock<HashSet<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session for `query`, returning its freshly minted id.
    pub fn create(&self, query: impl Into<String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut session = Session::new(id.clone(), query);
        session.status = SessionStatus::Running;
        self.sessions.write().insert(id.clone(), session);
        self.active.write().insert(id.clone());
        id
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active.read().contains(session_id)
    }

    /// Idempotent by step id.
    pub fn add_or_replace_step(&self, session_id: &str, step: Step) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.add_or_replace_step(step);
        }
    }

    pub fn set_answer(&self, session_id: &str, answer: impl Into<String>) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.set_answer(answer);
        }
    }

    pub fn set_explanation(&self, session_id: &str, explanation: impl Into<String>) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.set_explanation(explanation);
        }
    }

    /// Merges `sources` into the session's deduplicated-by-link list.
    pub fn set_sources(&self, session_id: &str, sources: Vec<Source>) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.add_sources(sources);
        }
    }

    pub fn mark_terminal(
        &self,
        session_id: &str,
        status: SessionStatus,
        error: Option<(String, ErrorKind)>,
    ) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.mark_terminal(status, error);
        }
        self.active.write().remove(session_id);
    }

    pub fn cancel(&self, session_id: &str, reason: impl Into<String>) {
        self.mark_terminal(
            session_id,
            SessionStatus::Cancelled,
            Some((reason.into(), ErrorKind::Cancelled)),
        );
    }

    /// Remove every session (used by `new_chat`, after each active task has
    /// been cancelled and allowed to settle).
    pub fn clear_all(&self) {
        self.sessions.write().clear();
        self.active.write().clear();
    }

    pub fn stats(&self) -> SessionStats {
        let sessions = self.sessions.read();
        let active = self.active.read().len();
        SessionStats {
            total: sessions.len(),
            active,
            terminal: sessions.len().saturating_sub(active),
        }
    }

    /// Remove terminal sessions whose `end_time` is older than `idle_ttl`.
    /// Used by the background sweeper.
    pub fn sweep_older_than(&self, idle_ttl: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - idle_ttl;
        let mut sessions = self.sessions.write();
        let stale: Vec<String> = sessions
            .values()
            .filter(|s| s.status.is_terminal())
            .filter(|s| s.end_time.is_some_and(|end| end < cutoff))
            .map(|s| s.id.clone())
            .collect();
        for id in &stale {
            sessions.remove(id);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_marks_session_active_and_running() {
        let store = SessionStore::new();
        let id = store.create("what is rust");
        assert!(store.is_active(&id));
        assert_eq!(store.get(&id).unwrap().status, SessionStatus::Running);
    }

    #[test]
    fn mark_terminal_clears_active_set() {
        let store = SessionStore::new();
        let id = store.create("q");
        store.mark_terminal(&id, SessionStatus::Completed, None);
        assert!(!store.is_active(&id));
        assert_eq!(store.get(&id).unwrap().status, SessionStatus::Completed);
    }

    #[test]
    fn cancel_sets_cancelled_status_with_kind() {
        let store = SessionStore::new();
        let id = store.create("q");
        store.cancel(&id, "user requested");
        let session = store.get(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert_eq!(session.error_kind, Some(ErrorKind::Cancelled));
    }

    #[test]
    fn clear_all_empties_store() {
        let store = SessionStore::new();
        store.create("a");
        store.create("b");
        store.clear_all();
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn stats_splits_active_and_terminal() {
        let store = SessionStore::new();
        let running = store.create("a");
        let done = store.create("b");
        store.mark_terminal(&done, SessionStatus::Completed, None);
        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.terminal, 1);
        assert!(store.is_active(&running));
    }

    #[test]
    fn sweep_removes_only_stale_terminal_sessions() {
        let store = SessionStore::new();
        let id = store.create("q");
        store.mark_terminal(&id, SessionStatus::Completed, None);
        // Not yet stale under a generous TTL.
        let removed = store.sweep_older_than(chrono::Duration::seconds(3600));
        assert_eq!(removed, 0);
        assert_eq!(store.stats().total, 1);

        // Stale under a zero TTL.
        let removed = store.sweep_older_than(chrono::Duration::seconds(0));
        assert_eq!(removed, 1);
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn sweep_leaves_active_sessions_alone() {
        let store = SessionStore::new();
        store.create("still running");
        let removed = store.sweep_older_than(chrono::Duration::seconds(0));
        assert_eq!(removed, 0);
        assert_eq!(store.stats().total, 1);
    }
}
