//! Run Scheduler: spawns and supervises the per-session Orchestrator
//! task — timeout, cancellation, and bounded global concurrency.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use dp_domain::error::ErrorKind;
use dp_domain::event::Event;
use dp_domain::session::SessionStatus;

use crate::orchestrator::run_orchestrator;
use crate::state::AppState;

pub struct RunScheduler {
    state: AppState,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RunScheduler {
    pub fn new(state: AppState) -> Self {
        Self { state, tasks: Mutex::new(HashMap::new()) }
    }

    /// Start a new session for `query`. Rejects with `Capacity` when the
    /// global concurrency limit (the `search_concurrency` semaphore) is
    /// already exhausted.
    pub fn start(&self, query: String) -> Result<String, ErrorKind> {
        let permit = Arc::clone(&self.state.search_concurrency)
            .try_acquire_owned()
            .map_err(|_| ErrorKind::Capacity)?;

        let session_id = self.state.sessions.create(query.clone());
        let cancel = self.state.cancel_map.register(&session_id);
        let timeout = Duration::from_secs(self.state.config.orchestrator.search_timeout_seconds);

        let state = self.state.clone();
        let task_session_id = session_id.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            tokio::select! {
                _ = run_orchestrator(state.clone(), task_session_id.clone(), query, task_cancel.clone()) => {}
                _ = tokio::time::sleep(timeout) => {
                    task_cancel.cancel();
                    state.sessions.mark_terminal(
                        &task_session_id,
                        SessionStatus::Error,
                        Some(("session exceeded its time budget".into(), ErrorKind::Timeout)),
                    );
                    state.events.publish(Event::Error {
                        timestamp: chrono::Utc::now(),
                        search_id: Some(task_session_id.clone()),
                        error: "session exceeded its time budget".into(),
                        step_id: None,
                        recoverable: false,
                        error_code: Some(ErrorKind::Timeout.code().to_string()),
                    });
                }
            }
            state.cancel_map.remove(&task_session_id);
        });

        self.tasks.lock().insert(session_id.clone(), handle);
        Ok(session_id)
    }

    /// Request cancellation of a running session. Returns false if no such
    /// session is currently running.
    pub fn cancel(&self, session_id: &str) -> bool {
        self.state.cancel_map.cancel(session_id)
    }

    /// Cancel every active session, wait for each supervising task to
    /// settle, clear the Session Store, and publish one `session_reset`
    /// event.
    pub async fn new_chat(&self) {
        self.state.cancel_map.cancel_all();

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        self.state.sessions.clear_all();
        self.state.events.publish(Event::SessionReset {
            timestamp: chrono::Utc::now(),
            message: "Session has been reset".into(),
            reason: Some("new_chat".into()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use tokio::sync::Semaphore;

    use dp_domain::config::Config;
    use dp_providers::{CodeExecutor, LlmProvider, SearchProvider};
    use dp_sessions::{CancelMap, SessionStore};

    use crate::events::EventBus;

    struct StubLlm;
    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        async fn generate(
            &self,
            _messages: &[dp_domain::message::Message],
            _stop: &[String],
        ) -> dp_domain::error::Result<String> {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
            Ok("Plan: answer directly\n#E1 = LLM[what is 2+2]".to_string())
        }
    }

    struct StubSearch;
    #[async_trait::async_trait]
    impl SearchProvider for StubSearch {
        async fn get_sources(
            &self,
            _query: &str,
        ) -> dp_domain::error::Result<Vec<dp_providers::SearchResult>> {
            Ok(Vec::new())
        }
    }

    struct StubCode;
    #[async_trait::async_trait]
    impl CodeExecutor for StubCode {
        async fn run(&self, _src: &str) -> dp_domain::error::Result<String> {
            Ok(String::new())
        }
    }

    fn test_state() -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            llm: Arc::new(StubLlm),
            search: Arc::new(StubSearch),
            code_executor: Arc::new(StubCode),
            sessions: Arc::new(SessionStore::new()),
            cancel_map: Arc::new(CancelMap::new()),
            events: Arc::new(EventBus::new(64)),
            search_concurrency: Arc::new(Semaphore::new(1)),
            started_at: std::time::Instant::now(),
        }
    }

    #[tokio::test]
    async fn start_rejects_beyond_concurrency_cap() {
        let state = test_state();
        let scheduler = RunScheduler::new(state);

        let first = scheduler.start("first question".into());
        assert!(first.is_ok());
        let second = scheduler.start("second question".into());
        assert_eq!(second, Err(ErrorKind::Capacity));
    }

    #[tokio::test]
    async fn new_chat_clears_sessions_and_emits_reset() {
        let state = test_state();
        let mut rx = state.events.subscribe();
        let scheduler = RunScheduler::new(state);

        scheduler.start("q".into()).unwrap();
        scheduler.new_chat().await;

        assert_eq!(scheduler.state.sessions.stats().total, 0);

        let mut saw_reset = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, Event::SessionReset { .. }) {
                saw_reset = true;
            }
        }
        assert!(saw_reset);
    }
}
