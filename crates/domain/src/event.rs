use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{StepKind, StepMetadata, StepStatus};

/// A typed event broadcast by the Event Bus. Every variant carries a
/// `timestamp` (named `server_time` on `Connection`/`Heartbeat`, which
/// predate the others and already meant the same thing) and, where
/// relevant, a `search_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "connection")]
    Connection {
        connected: bool,
        client_id: String,
        server_time: DateTime<Utc>,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat {
        server_time: DateTime<Utc>,
        client_count: usize,
    },
    #[serde(rename = "step_update")]
    StepUpdate {
        timestamp: DateTime<Utc>,
        search_id: String,
        step_id: String,
        step_type: StepKind,
        status: StepStatus,
        title: String,
        #[serde(default)]
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<StepMetadata>,
    },
    #[serde(rename = "search_complete")]
    SearchComplete {
        timestamp: DateTime<Utc>,
        search_id: String,
        result: String,
        total_steps: usize,
        duration: f64,
        final_answer: String,
    },
    #[serde(rename = "error")]
    Error {
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        search_id: Option<String>,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
        #[serde(default = "default_true")]
        recoverable: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
    #[serde(rename = "session_reset")]
    SessionReset {
        timestamp: DateTime<Utc>,
        #[serde(default = "default_reset_message")]
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

fn default_true() -> bool {
    true
}
fn default_reset_message() -> String {
    "Session has been reset".into()
}

impl Event {
    pub fn search_id(&self) -> Option<&str> {
        match self {
            Event::StepUpdate { search_id, .. } => Some(search_id),
            Event::SearchComplete { search_id, .. } => Some(search_id),
            Event::Error { search_id, .. } => search_id.as_deref(),
            _ => None,
        }
    }
}

/// Inbound client messages on the streaming channel. Anything that fails to
/// deserialize into this enum is a malformed message: logged and dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerAck {
    Pong,
}
