use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Error | SessionStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Plan,
    Search,
    Code,
    Llm,
    Solve,
    Replan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_steps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub status: StepStatus,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StepMetadata>,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            status: StepStatus::Pending,
            title: title.into(),
            content: String::new(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub query: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl Session {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            status: SessionStatus::Idle,
            steps: Vec::new(),
            final_answer: None,
            explanation: None,
            sources: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: None,
            error: None,
            error_kind: None,
        }
    }

    /// `add_or_replace_step`: idempotent by step id — overwrites an existing
    /// step in place (preserving position), or appends a new one.
    pub fn add_or_replace_step(&mut self, step: Step) {
        if self.status.is_terminal() {
            return;
        }
        if let Some(existing) = self.steps.iter_mut().find(|s| s.id == step.id) {
            *existing = step;
        } else {
            self.steps.push(step);
        }
    }

    pub fn mark_terminal(&mut self, status: SessionStatus, error: Option<(String, ErrorKind)>) {
        if self.status.is_terminal() {
            return;
        }
        debug_assert!(status.is_terminal());
        self.status = status;
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration_seconds = Some((now - self.start_time).num_milliseconds() as f64 / 1000.0);
        if let Some((message, kind)) = error {
            self.error = Some(message);
            self.error_kind = Some(kind);
        }
    }

    pub fn set_answer(&mut self, answer: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.final_answer = Some(answer.into());
    }

    pub fn set_explanation(&mut self, explanation: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.explanation = Some(explanation.into());
    }

    /// Merge new sources into the session's deduplicated-by-link list,
    /// preserving first-seen order.
    pub fn add_sources(&mut self, new_sources: Vec<Source>) {
        if self.status.is_terminal() {
            return;
        }
        for source in new_sources {
            if !self.sources.iter().any(|s| s.link == source.link) {
                self.sources.push(source);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_or_replace_step_overwrites_by_id() {
        let mut session = Session::new("s1", "query");
        session.add_or_replace_step(Step::new("step-1", StepKind::Plan, "plan"));
        session.add_or_replace_step(Step::new("step-2", StepKind::Search, "search"));
        assert_eq!(session.steps.len(), 2);

        let mut updated = Step::new("step-1", StepKind::Plan, "plan");
        updated.status = StepStatus::Completed;
        session.add_or_replace_step(updated);

        assert_eq!(session.steps.len(), 2);
        assert_eq!(session.steps[0].status, StepStatus::Completed);
    }

    #[test]
    fn terminal_session_rejects_further_mutation() {
        let mut session = Session::new("s1", "query");
        session.mark_terminal(SessionStatus::Completed, None);
        session.add_or_replace_step(Step::new("step-1", StepKind::Plan, "plan"));
        session.set_answer("too late");
        assert!(session.steps.is_empty());
        assert!(session.final_answer.is_none());
    }

    #[test]
    fn add_sources_dedups_by_link_preserving_order() {
        let mut session = Session::new("s1", "query");
        session.add_sources(vec![
            Source {
                title: "a".into(),
                link: "https://a".into(),
                snippet: None,
            },
            Source {
                title: "b".into(),
                link: "https://b".into(),
                snippet: None,
            },
        ]);
        session.add_sources(vec![
            Source {
                title: "a again".into(),
                link: "https://a".into(),
                snippet: None,
            },
            Source {
                title: "c".into(),
                link: "https://c".into(),
                snippet: None,
            },
        ]);
        let links: Vec<_> = session.sources.iter().map(|s| s.link.as_str()).collect();
        assert_eq!(links, vec!["https://a", "https://b", "https://c"]);
        assert_eq!(session.sources[0].title, "a");
    }

    #[test]
    fn mark_terminal_sets_duration() {
        let mut session = Session::new("s1", "query");
        session.mark_terminal(
            SessionStatus::Error,
            Some(("boom".into(), ErrorKind::Timeout)),
        );
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.duration_seconds.is_some());
        assert_eq!(session.error.as_deref(), Some("boom"));
    }
}
