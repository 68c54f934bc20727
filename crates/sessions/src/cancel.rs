//! Per-session cancellation tokens.
//!
//! Each running session gets a [`CancelToken`]. The Run Scheduler calls
//! `cancel()` on it; the Orchestrator polls `is_cancelled()` at its
//! suspension points (after every tool invocation) and moves the Session to
//! `Cancelled` once observed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once cancellation has been requested. Used to race an
    /// in-flight tool invocation so it can be abandoned rather than
    /// awaited to completion.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks active cancellation tokens keyed by session id.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a new cancel token for a session.
    pub fn register(&self, session_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(session_id.to_owned(), token.clone());
        token
    }

    /// Cancel the running session. Returns true if a token was found.
    pub fn cancel(&self, session_id: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(session_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Cancel every registered session (used by `new_chat`).
    pub fn cancel_all(&self) {
        for token in self.tokens.lock().values() {
            token.cancel();
        }
    }

    pub fn remove(&self, session_id: &str) {
        self.tokens.lock().remove(session_id);
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.tokens.lock().contains_key(session_id)
    }
}
