use serde::{Deserialize, Serialize};

/// Shared error type used across every deepprobe crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("at capacity")]
    Capacity,

    #[error("unknown session {0}")]
    UnknownSession(String),

    #[error("session {0} is not active")]
    SessionNotActive(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The taxonomy of orchestrator-level failure kinds. These are distinct from
/// [`Error`] variants: a `Kind` is a classification carried on a Session or an
/// `error` event (`error_code`), not necessarily a Rust error type propagated
/// via `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidQuery,
    Capacity,
    PlanParseEmpty,
    PlanUnparseableAfterReplan,
    SearchUnsatisfactory,
    CodeExecutionFailure,
    LlmReplanRequest,
    ToolCallTransport,
    Timeout,
    Cancelled,
    SubscriberSend,
}

impl ErrorKind {
    /// Whether this kind, observed mid-run, can still be recovered by a
    /// Reflecting→Planning transition.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::PlanParseEmpty
                | ErrorKind::SearchUnsatisfactory
                | ErrorKind::CodeExecutionFailure
                | ErrorKind::LlmReplanRequest
                | ErrorKind::ToolCallTransport
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::Capacity => "capacity",
            ErrorKind::PlanParseEmpty => "plan_parse_empty",
            ErrorKind::PlanUnparseableAfterReplan => "plan_unparseable_after_replan",
            ErrorKind::SearchUnsatisfactory => "search_unsatisfactory",
            ErrorKind::CodeExecutionFailure => "code_execution_failure",
            ErrorKind::LlmReplanRequest => "llm_replan_request",
            ErrorKind::ToolCallTransport => "tool_call_transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::SubscriberSend => "subscriber_send",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
