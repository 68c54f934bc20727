//! Public API surface: start/status/cancel/reset handlers that
//! translate directly to Orchestrator and Session Store operations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use dp_domain::error::ErrorKind;
use dp_domain::session::Session;

use crate::state::ApiState;

const MAX_QUERY_LEN: usize = 1000;

/// Uniform error body for every non-2xx response.
#[derive(Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub error_code: String,
    pub timestamp: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_id: Option<String>,
}

/// An API-layer error. `error_code` is the ingress-facing vocabulary
/// (`invalid_query`, `not_found`, `conflict`, ...), distinct from the
/// Orchestrator's internal [`ErrorKind`] taxonomy — an unknown `search_id`
/// is an API concern, not something the Orchestrator ever classifies.
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
    pub error_code: &'static str,
    pub search_id: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, error_code: &'static str, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into(), error_code, search_id: None }
    }

    fn with_search_id(mut self, id: impl Into<String>) -> Self {
        self.search_id = Some(id.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.detail,
            error_code: self.error_code.to_string(),
            timestamp: Utc::now(),
            search_id: self.search_id,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct StartSearchRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct StartSearchResponse {
    pub search_id: String,
    pub status: &'static str,
    pub message: String,
}

pub async fn start_search(
    State(state): State<ApiState>,
    Json(request): Json<StartSearchRequest>,
) -> Result<Json<StartSearchResponse>, ApiError> {
    let query = request.query.trim().to_string();
    if query.is_empty() || query.chars().count() > MAX_QUERY_LEN {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_query",
            format!("query must be 1..{MAX_QUERY_LEN} characters"),
        ));
    }

    match state.scheduler.start(query) {
        Ok(search_id) => Ok(Json(StartSearchResponse {
            search_id,
            status: "started",
            message: "search started".into(),
        })),
        Err(ErrorKind::Capacity) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "capacity",
            "server is at capacity, try again shortly",
        )),
        Err(kind) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("failed to start search: {kind}"),
        )),
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub search_id: String,
    pub status: dp_domain::session::SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

fn session_or_404(state: &ApiState, id: &str) -> Result<Session, ApiError> {
    state.app.sessions.get(id).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, "not_found", format!("unknown search {id}")).with_search_id(id)
    })
}

pub async fn get_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = session_or_404(&state, &id)?;
    let current_step = session.steps.last().map(|s| s.title.clone());
    let progress = if session.steps.is_empty() {
        None
    } else {
        let completed = session
            .steps
            .iter()
            .filter(|s| s.status == dp_domain::session::StepStatus::Completed)
            .count();
        Some(completed as f64 / session.steps.len() as f64)
    };
    Ok(Json(StatusResponse { search_id: session.id, status: session.status, current_step, progress }))
}

pub async fn get_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(session_or_404(&state, &id)?))
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
    pub message: String,
}

pub async fn cancel_search(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<CancelResponse>, ApiError> {
    session_or_404(&state, &id)?;
    if !state.app.sessions.is_active(&id) {
        return Err(ApiError::new(StatusCode::CONFLICT, "conflict", "session is not active").with_search_id(id));
    }

    // The reason is accepted for API compatibility but the Session Store
    // records a fixed cancellation reason; see `CancelMap::cancel`.
    let _reason = body.and_then(|b| b.0.reason);
    state.scheduler.cancel(&id);
    Ok(Json(CancelResponse { status: "cancelled", message: "cancellation requested".into() }))
}

#[derive(Serialize)]
pub struct NewChatResponse {
    pub status: &'static str,
    pub message: String,
}

pub async fn new_chat(State(state): State<ApiState>) -> Json<NewChatResponse> {
    state.scheduler.new_chat().await;
    Json(NewChatResponse { status: "reset", message: "all sessions cleared".into() })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
    pub uptime_seconds: f64,
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        uptime_seconds: state.app.started_at.elapsed().as_secs_f64(),
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub sessions: dp_sessions::SessionStats,
    pub connections: usize,
    pub running_tasks: usize,
    pub active_searches: usize,
}

pub async fn stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    let session_stats = state.app.sessions.stats();
    Json(StatsResponse {
        sessions: session_stats,
        connections: state.app.events.client_count(),
        running_tasks: session_stats.active,
        active_searches: session_stats.active,
    })
}
