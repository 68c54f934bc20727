use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use dp_domain::config::Config;
use dp_providers::{CodeExecutor, LlmProvider, SearchProvider};
use dp_sessions::{CancelMap, SessionStore};

use crate::events::EventBus;
use crate::scheduler::RunScheduler;

/// Shared application state passed to the Orchestrator tasks spawned by the
/// Run Scheduler. Deliberately does NOT hold the `RunScheduler` itself —
/// the scheduler owns one `AppState` by value, so embedding a handle back to
/// it here would make every clone keep that scheduler alive forever. The
/// API layer instead gets both via [`ApiState`].
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── External collaborators ───────────────────────────────────────
    pub llm: Arc<dyn LlmProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub code_executor: Arc<dyn CodeExecutor>,

    // ── Run state ────────────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub cancel_map: Arc<CancelMap>,
    pub events: Arc<EventBus>,

    /// Bounds the number of concurrently `running` Sessions.
    pub search_concurrency: Arc<Semaphore>,

    pub started_at: Instant,
}

/// The Axum router's state type: the shared runtime state plus a handle to
/// the Run Scheduler, used by the Public API handlers to start/cancel
/// sessions.
#[derive(Clone)]
pub struct ApiState {
    pub app: AppState,
    pub scheduler: Arc<RunScheduler>,
}
