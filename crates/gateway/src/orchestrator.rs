//! Orchestrator: the plan → execute → (replan | solve) state machine
//! that owns one Session end to end.

use dp_domain::error::ErrorKind;
use dp_domain::event::Event;
use dp_domain::message::Message;
use dp_domain::plan::{render_plan_with_evidence, Plan, Tool};
use dp_domain::session::{SessionStatus, Step, StepKind, StepMetadata, StepStatus};

use dp_sessions::CancelToken;
use dp_tools::{extract_answer, parse_plan, prompts, run_code, run_llm, run_search, Bindings, ToolFailure};

use crate::state::AppState;

enum Phase {
    Planning { reflection: Option<String> },
    Executing { index: usize },
    Reflecting { failure: ToolFailure },
    Solving,
}

/// Drive one Session from `running` to a terminal status. Returns once the
/// Session is `completed`, `error`, or `cancelled`.
pub async fn run_orchestrator(state: AppState, session_id: String, query: String, cancel: CancelToken) {
    let max_replan_iter = state.config.orchestrator.max_replan_iter;
    let recursion_limit = state.config.orchestrator.recursion_limit;

    let mut steps: Plan = Vec::new();
    let mut bindings = Bindings::new();
    let mut replan_iter: u32 = 0;
    let mut previous_plan_text = String::new();
    let mut phase = Phase::Planning { reflection: None };
    let mut transitions: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return abandon(&state, &session_id).await;
        }
        transitions += 1;
        if transitions > recursion_limit {
            fail_session(
                &state,
                &session_id,
                ErrorKind::ToolCallTransport,
                "recursion budget exceeded",
            )
            .await;
            return;
        }

        phase = match phase {
            Phase::Planning { reflection } => {
                let prompt = match &reflection {
                    None => prompts::plan_user_prompt(&query),
                    Some(r) => prompts::replan_user_prompt(&query, &previous_plan_text, r),
                };
                let messages = [
                    Message::system(prompts::plan_system_prompt()),
                    Message::user(prompt),
                ];

                let raw = tokio::select! {
                    result = state.llm.generate(&messages, &[]) => match result {
                        Ok(text) => text,
                        Err(_) => String::new(),
                    },
                    _ = cancel.cancelled() => return abandon(&state, &session_id).await,
                };

                record_step(&state, &session_id, "plan", StepKind::Plan, "Planning", &raw);

                let parsed = parse_plan(&raw);
                if parsed.is_empty() {
                    previous_plan_text = raw;
                    Phase::Reflecting {
                        failure: ToolFailure {
                            kind: ErrorKind::PlanParseEmpty,
                            message: "planner produced no parseable steps".into(),
                        },
                    }
                } else {
                    steps = parsed;
                    bindings = Bindings::new();
                    Phase::Executing { index: 0 }
                }
            }

            Phase::Executing { index } if index < steps.len() => {
                let step = &steps[index];
                let resolved_input = bindings.resolve(&step.tool_input);

                let step_id = format!("step-{}", step.binding_name);
                record_step(
                    &state,
                    &session_id,
                    &step_id,
                    tool_kind(step.tool),
                    &step.description,
                    &resolved_input,
                );

                let outcome = tokio::select! {
                    result = dispatch(&state, step.tool, &resolved_input) => result,
                    _ = cancel.cancelled() => return abandon(&state, &session_id).await,
                };

                match outcome {
                    Ok(success) => {
                        bindings.insert(step.binding_name.clone(), success.result.clone());
                        if !success.sources.is_empty() {
                            state.sessions.set_sources(&session_id, success.sources);
                        }
                        complete_step(&state, &session_id, &step_id, &success.result);
                        Phase::Executing { index: index + 1 }
                    }
                    Err(failure) => {
                        state.events.publish(Event::Error {
                            timestamp: chrono::Utc::now(),
                            search_id: Some(session_id.clone()),
                            error: failure.message.clone(),
                            step_id: Some(step_id),
                            recoverable: failure.kind.is_recoverable() && replan_iter < max_replan_iter,
                            error_code: Some(failure.kind.code().to_string()),
                        });
                        previous_plan_text = render_plan_with_evidence(&steps, bindings.as_pairs());
                        Phase::Reflecting { failure }
                    }
                }
            }

            Phase::Executing { .. } => Phase::Solving,

            Phase::Reflecting { failure } => {
                if replan_iter >= max_replan_iter {
                    if failure.kind == ErrorKind::PlanParseEmpty {
                        fail_session(
                            &state,
                            &session_id,
                            ErrorKind::PlanUnparseableAfterReplan,
                            "replan budget exhausted with no parseable plan",
                        )
                        .await;
                        return;
                    }
                    Phase::Solving
                } else {
                    let reflection = tokio::select! {
                        result = state.llm.generate(
                            &[Message::user(prompts::reflection_prompt(&query, &previous_plan_text))],
                            &[],
                        ) => result.unwrap_or(failure.message),
                        _ = cancel.cancelled() => return abandon(&state, &session_id).await,
                    };
                    replan_iter += 1;
                    Phase::Planning { reflection: Some(reflection) }
                }
            }

            Phase::Solving => {
                let plan_with_evidence = render_plan_with_evidence(&steps, bindings.as_pairs());
                let solver_response = tokio::select! {
                    result = state.llm.generate(
                        &[Message::user(prompts::solver_prompt(&query, &plan_with_evidence))],
                        &[],
                    ) => result.unwrap_or_default(),
                    _ = cancel.cancelled() => return abandon(&state, &session_id).await,
                };
                let answer = extract_answer(&solver_response).unwrap_or(solver_response);

                state.sessions.set_answer(&session_id, answer.clone());

                if let Ok(explanation) = state
                    .llm
                    .generate(
                        &[Message::user(prompts::explanation_prompt(&query, &plan_with_evidence, &answer))],
                        &[],
                    )
                    .await
                {
                    state.sessions.set_explanation(&session_id, explanation);
                }

                complete_step(&state, &session_id, "solve", &answer);
                state.sessions.mark_terminal(&session_id, SessionStatus::Completed, None);

                let session = state.sessions.get(&session_id);
                let (total_steps, duration) = session
                    .as_ref()
                    .map(|s| (s.steps.len(), s.duration_seconds.unwrap_or(0.0)))
                    .unwrap_or((0, 0.0));

                state.events.publish(Event::SearchComplete {
                    timestamp: chrono::Utc::now(),
                    search_id: session_id.clone(),
                    result: answer.clone(),
                    total_steps,
                    duration,
                    final_answer: answer,
                });
                return;
            }
        };
    }
}

async fn dispatch(
    state: &AppState,
    tool: Tool,
    resolved_input: &str,
) -> Result<dp_tools::ToolSuccess, ToolFailure> {
    match tool {
        Tool::Search => {
            run_search(
                state.llm.as_ref(),
                state.search.as_ref(),
                resolved_input,
                state.config.search.max_sources_per_search,
            )
            .await
        }
        Tool::Code => run_code(state.llm.as_ref(), state.code_executor.as_ref(), resolved_input).await,
        Tool::Llm => run_llm(state.llm.as_ref(), resolved_input).await,
    }
}

fn tool_kind(tool: Tool) -> StepKind {
    match tool {
        Tool::Search => StepKind::Search,
        Tool::Code => StepKind::Code,
        Tool::Llm => StepKind::Llm,
    }
}

fn record_step(state: &AppState, session_id: &str, step_id: &str, kind: StepKind, title: &str, content: &str) {
    let mut step = Step::new(step_id, kind, title);
    step.status = StepStatus::Running;
    step.content = content.to_string();
    state.sessions.add_or_replace_step(session_id, step.clone());
    state.events.publish(Event::StepUpdate {
        timestamp: chrono::Utc::now(),
        search_id: session_id.to_string(),
        step_id: step_id.to_string(),
        step_type: kind,
        status: StepStatus::Running,
        title: title.to_string(),
        content: content.to_string(),
        metadata: None,
    });
}

fn complete_step(state: &AppState, session_id: &str, step_id: &str, content: &str) {
    let Some(session) = state.sessions.get(session_id) else {
        return;
    };
    let Some(existing) = session.steps.iter().find(|s| s.id == step_id) else {
        return;
    };

    let mut updated = existing.clone();
    updated.status = StepStatus::Completed;
    updated.content = content.to_string();
    state.sessions.add_or_replace_step(session_id, updated.clone());

    state.events.publish(Event::StepUpdate {
        timestamp: chrono::Utc::now(),
        search_id: session_id.to_string(),
        step_id: step_id.to_string(),
        step_type: updated.kind,
        status: StepStatus::Completed,
        title: updated.title,
        content: content.to_string(),
        metadata: Some(StepMetadata::default()),
    });
}

async fn fail_session(state: &AppState, session_id: &str, kind: ErrorKind, message: &str) {
    state
        .sessions
        .mark_terminal(session_id, SessionStatus::Error, Some((message.to_string(), kind)));
    state.events.publish(Event::Error {
        timestamp: chrono::Utc::now(),
        search_id: Some(session_id.to_string()),
        error: message.to_string(),
        step_id: None,
        recoverable: false,
        error_code: Some(kind.code().to_string()),
    });
}

async fn abandon(state: &AppState, session_id: &str) {
    state.sessions.cancel(session_id, "cancelled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use tokio::sync::{Mutex as AsyncMutex, Semaphore};

    use dp_domain::config::Config;
    use dp_providers::{CodeExecutor, LlmProvider, SearchProvider, SearchResult};
    use dp_sessions::{CancelMap, SessionStore};

    use crate::events::EventBus;

    /// An `LlmProvider` that returns one scripted response per call, in
    /// order. Returns an empty string once the script is exhausted, which
    /// every call site along the Orchestrator's happy path treats as a
    /// harmless (if unsatisfying) response rather than a panic.
    struct ScriptedLlm {
        responses: AsyncMutex<std::collections::VecDeque<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: AsyncMutex::new(responses.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, _messages: &[Message], _stop: &[String]) -> dp_domain::error::Result<String> {
            Ok(self.responses.lock().await.pop_front().unwrap_or_default())
        }
    }

    struct StubSearch {
        result: SearchResult,
    }

    #[async_trait::async_trait]
    impl SearchProvider for StubSearch {
        async fn get_sources(&self, _query: &str) -> dp_domain::error::Result<Vec<SearchResult>> {
            Ok(vec![self.result.clone()])
        }
    }

    struct StubCode {
        stdout: String,
    }

    #[async_trait::async_trait]
    impl CodeExecutor for StubCode {
        async fn run(&self, _src: &str) -> dp_domain::error::Result<String> {
            Ok(self.stdout.clone())
        }
    }

    fn test_state(llm: ScriptedLlm, code_stdout: &str) -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            llm: Arc::new(llm),
            search: Arc::new(StubSearch {
                result: SearchResult {
                    title: "source".into(),
                    link: "https://example.com/source".into(),
                    snippet: "a snippet".into(),
                },
            }),
            code_executor: Arc::new(StubCode { stdout: code_stdout.to_string() }),
            sessions: Arc::new(SessionStore::new()),
            cancel_map: Arc::new(CancelMap::new()),
            events: Arc::new(EventBus::new(64)),
            search_concurrency: Arc::new(Semaphore::new(10)),
            started_at: std::time::Instant::now(),
        }
    }

    /// Scenario 1: single-search happy path.
    #[tokio::test]
    async fn single_search_happy_path() {
        let llm = ScriptedLlm::new(&[
            "Plan: find author\n#E1 = Search[author of The Old Man and the Sea]",
            "author of The Old Man and the Sea",
            "<answer>Ernest Hemingway</answer>",
            "<answer>Ernest Hemingway</answer>",
            "because Hemingway wrote it",
        ]);
        let state = test_state(llm, "");
        let cancel = CancelToken::new();
        let session_id = state.sessions.create("Who wrote The Old Man and the Sea?");

        run_orchestrator(state.clone(), session_id.clone(), "Who wrote The Old Man and the Sea?".into(), cancel).await;

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.final_answer.as_deref(), Some("Ernest Hemingway"));
        assert_eq!(session.sources.len(), 1);
        assert!(session.steps.iter().any(|s| s.kind == StepKind::Plan && s.status == StepStatus::Completed));
        assert!(session.steps.iter().any(|s| s.kind == StepKind::Search && s.status == StepStatus::Completed));
    }

    /// Scenario 2: multi-step arithmetic — Search then Code, chaining #E1
    /// into #E2's resolved input.
    #[tokio::test]
    async fn multi_step_arithmetic() {
        let llm = ScriptedLlm::new(&[
            "Plan: fetch base\n#E1 = Search[distance between bases in baseball]\nPlan: double\n#E2 = Code[#E1 * 2]",
            "distance between bases",
            "<answer>90</answer>",
            "```python\nprint(90 * 2)\n```",
            "<answer>180</answer>",
            "90 times 2 is 180",
        ]);
        let state = test_state(llm, "180");
        let cancel = CancelToken::new();
        let session_id = state.sessions.create("90 times 2");

        run_orchestrator(state.clone(), session_id.clone(), "90 times 2".into(), cancel).await;

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.final_answer.as_deref(), Some("180"));
    }

    /// Scenario 3: one unsatisfactory search triggers exactly one replan,
    /// and the second attempt succeeds.
    #[tokio::test]
    async fn replan_on_unsatisfactory_search() {
        let llm = ScriptedLlm::new(&[
            "Plan: find author\n#E1 = Search[author of The Old Man and the Sea]",
            "author of The Old Man and the Sea",
            "no tag here, nothing usable",
            "the search context was irrelevant",
            "Plan: find author again\n#E1 = Search[Ernest Hemingway Old Man and the Sea author]",
            "Ernest Hemingway author search",
            "<answer>Ernest Hemingway</answer>",
            "<answer>Ernest Hemingway</answer>",
            "explanation",
        ]);
        let state = test_state(llm, "");
        let mut rx = state.events.subscribe();
        let cancel = CancelToken::new();
        let session_id = state.sessions.create("Who wrote The Old Man and the Sea?");

        run_orchestrator(state.clone(), session_id.clone(), "Who wrote The Old Man and the Sea?".into(), cancel).await;

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.final_answer.as_deref(), Some("Ernest Hemingway"));

        let mut recoverable_errors = 0;
        while let Ok(event) = rx.try_recv() {
            if let Event::Error { recoverable, .. } = event {
                assert!(recoverable);
                recoverable_errors += 1;
            }
        }
        assert_eq!(recoverable_errors, 1);
    }

    /// Scenario 4: the replan budget is exhausted and both search attempts
    /// fail, but a parseable plan survives — solves with partial evidence.
    #[tokio::test]
    async fn replan_budget_exhausted_proceeds_to_solving_with_partial_evidence() {
        let llm = ScriptedLlm::new(&[
            "Plan: find author\n#E1 = Search[author of The Old Man and the Sea]",
            "author of The Old Man and the Sea",
            "no usable tag",
            "reflection: still unclear",
            "Plan: find author again\n#E1 = Search[Ernest Hemingway Old Man and the Sea author]",
            "Ernest Hemingway author search",
            "still no usable tag",
        ]);
        let state = test_state(llm, "");
        let cancel = CancelToken::new();
        let session_id = state.sessions.create("Who wrote The Old Man and the Sea?");

        run_orchestrator(state.clone(), session_id.clone(), "Who wrote The Old Man and the Sea?".into(), cancel).await;

        let session = state.sessions.get(&session_id).unwrap();
        // The replan budget (max_replan_iter=1) is spent and the second
        // search is still unsatisfactory, but a non-empty plan survived, so
        // the Orchestrator proceeds to Solving with partial evidence rather
        // than terminating in error (see SPEC_FULL.md's Reflecting rules).
        assert_eq!(session.status, SessionStatus::Completed);
    }

    /// Scenario 4b: the replan budget is exhausted and the planner never
    /// produced a parseable plan at all — this is the terminal-error path.
    #[tokio::test]
    async fn replan_budget_exhausted_with_unparseable_plan_terminates_in_error() {
        let llm = ScriptedLlm::new(&[
            "I cannot form a plan for this.",
            "reflection on why no plan emerged",
            "still cannot form a plan.",
        ]);
        let state = test_state(llm, "");
        let cancel = CancelToken::new();
        let session_id = state.sessions.create("an impossible question");

        run_orchestrator(state.clone(), session_id.clone(), "an impossible question".into(), cancel).await;

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Error);
        assert_eq!(session.error_kind, Some(ErrorKind::PlanUnparseableAfterReplan));
    }

    /// A plan that executed at least one step before failing must not be
    /// mistaken for a surviving plan once the *next* replan attempt fails to
    /// parse at all: the failure that triggered the final Reflecting entry
    /// is what decides fail-vs-solve, not whatever stale steps are left over
    /// from an earlier, already-abandoned plan.
    #[tokio::test]
    async fn replan_budget_exhausted_after_later_parse_failure_terminates_in_error() {
        let llm = ScriptedLlm::new(&[
            "Plan: find author\n#E1 = Search[author of The Old Man and the Sea]",
            "search query reworded",
            "no usable answer here",
            "reflection on the unsatisfactory search",
            "I still cannot determine a plan.",
        ]);
        let state = test_state(llm, "");
        let cancel = CancelToken::new();
        let session_id = state.sessions.create("Who wrote The Old Man and the Sea?");

        run_orchestrator(state.clone(), session_id.clone(), "Who wrote The Old Man and the Sea?".into(), cancel).await;

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Error);
        assert_eq!(session.error_kind, Some(ErrorKind::PlanUnparseableAfterReplan));
    }

    /// Scenario 5: cancelling mid-flight abandons the in-flight tool call
    /// and moves the Session to `cancelled` without a terminal
    /// `search_complete` event.
    #[tokio::test]
    async fn cancellation_mid_flight() {
        struct SlowLlm;
        #[async_trait::async_trait]
        impl LlmProvider for SlowLlm {
            async fn generate(&self, _messages: &[Message], _stop: &[String]) -> dp_domain::error::Result<String> {
                tokio::time::sleep(StdDuration::from_secs(5)).await;
                Ok("Plan: find author\n#E1 = Search[author of The Old Man and the Sea]".to_string())
            }
        }

        let state = AppState {
            config: Arc::new(Config::default()),
            llm: Arc::new(SlowLlm),
            search: Arc::new(StubSearch {
                result: SearchResult { title: "s".into(), link: "https://s".into(), snippet: "x".into() },
            }),
            code_executor: Arc::new(StubCode { stdout: String::new() }),
            sessions: Arc::new(SessionStore::new()),
            cancel_map: Arc::new(CancelMap::new()),
            events: Arc::new(EventBus::new(64)),
            search_concurrency: Arc::new(Semaphore::new(10)),
            started_at: std::time::Instant::now(),
        };
        let mut rx = state.events.subscribe();
        let cancel = CancelToken::new();
        let session_id = state.sessions.create("Who wrote The Old Man and the Sea?");

        let task_state = state.clone();
        let task_session_id = session_id.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_orchestrator(task_state, task_session_id, "Who wrote The Old Man and the Sea?".into(), task_cancel).await;
        });

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);

        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, Event::SearchComplete { .. }));
        }
    }
}
