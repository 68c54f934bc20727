//! Tool Adapters: Search, Code, and LLM, each wrapping the external
//! collaborator traits from `dp_providers` with the tag-extraction and
//! failure-classification rules the Orchestrator depends on.

use regex::Regex;
use std::sync::OnceLock;

use dp_domain::error::ErrorKind;
use dp_domain::message::Message;
use dp_domain::session::Source;

use dp_providers::traits::build_context_block;
use dp_providers::{CodeExecutor, LlmProvider, SearchProvider};

use crate::prompts;

/// A tool adapter's success: the textual result plus any sources it
/// surfaced (non-empty only for Search).
pub struct ToolSuccess {
    pub result: String,
    pub sources: Vec<Source>,
}

/// A tool adapter's failure, carrying the error kind the Orchestrator
/// switches on to decide Reflecting vs. terminal.
pub struct ToolFailure {
    pub kind: ErrorKind,
    pub message: String,
}

pub type ToolResult = Result<ToolSuccess, ToolFailure>;

fn transport_failure(err: dp_domain::error::Error) -> ToolFailure {
    ToolFailure {
        kind: ErrorKind::ToolCallTransport,
        message: err.to_string(),
    }
}

fn tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).expect("valid tag regex")
}

/// Extract the inner text of the first `<tag>...</tag>` occurrence.
fn extract_tag(text: &str, tag: &str) -> Option<String> {
    tag_regex(tag)
        .captures(text)
        .map(|c| c[1].trim().to_string())
}

/// Extract `<answer>...</answer>` from a Solving-transition LLM response.
/// Used by the Orchestrator, which falls back to the whole response when
/// the tag is absent (the answer-extraction is permissive).
pub fn extract_answer(text: &str) -> Option<String> {
    extract_tag(text, "answer")
}

fn fenced_code_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```(?:\w+\n)?(.*?)```").expect("valid fence regex"))
}

/// Extract the last fenced code block in `text`, if any.
fn extract_last_code_block(text: &str) -> Option<String> {
    fenced_code_block()
        .captures_iter(text)
        .last()
        .map(|c| c[1].trim().to_string())
}

/// Search adapter: reword the query, search, truncate, build a
/// context block, then ask the LLM to answer from that context.
pub async fn run_search(
    llm: &dyn LlmProvider,
    search: &dyn SearchProvider,
    resolved_input: &str,
    max_sources_per_search: usize,
) -> ToolResult {
    let reworded = llm
        .generate(
            &[Message::user(prompts::question_reword_prompt(resolved_input))],
            &[],
        )
        .await
        .map_err(transport_failure)?;
    let query = extract_tag(&reworded, "reworded_query").unwrap_or_else(|| resolved_input.to_string());

    let mut results = search.get_sources(&query).await.map_err(transport_failure)?;
    results.truncate(max_sources_per_search);

    let context_block = build_context_block(&results, &query, false);
    let summary = llm
        .generate(&[Message::user(prompts::summary_prompt(&query, &context_block))], &[])
        .await
        .map_err(transport_failure)?;

    let sources: Vec<Source> = results
        .into_iter()
        .map(|r| Source {
            title: r.title,
            link: r.link,
            snippet: Some(r.snippet),
        })
        .collect();

    match extract_tag(&summary, "answer") {
        Some(answer) => Ok(ToolSuccess { result: answer, sources }),
        None => Err(ToolFailure {
            kind: ErrorKind::SearchUnsatisfactory,
            message: summary,
        }),
    }
}

/// Code adapter: ask the LLM for a script, run the last fenced code
/// block it returns, capture stdout.
pub async fn run_code(
    llm: &dyn LlmProvider,
    executor: &dyn CodeExecutor,
    resolved_input: &str,
) -> ToolResult {
    let response = llm
        .generate(
            &[
                Message::system(prompts::code_system_prompt()),
                Message::user(prompts::code_user_prompt(resolved_input)),
            ],
            &[],
        )
        .await
        .map_err(transport_failure)?;

    let Some(script) = extract_last_code_block(&response) else {
        return Err(ToolFailure {
            kind: ErrorKind::CodeExecutionFailure,
            message: "no fenced code block in LLM response".into(),
        });
    };

    match executor.run(&script).await {
        Ok(stdout) => Ok(ToolSuccess { result: stdout, sources: Vec::new() }),
        Err(err) => Err(ToolFailure {
            kind: ErrorKind::CodeExecutionFailure,
            message: err.to_string(),
        }),
    }
}

/// LLM adapter: ask a commonsense question; `<answer>` succeeds,
/// `<replan>` signals a replan request, anything else passes through
/// permissively as the raw result.
pub async fn run_llm(llm: &dyn LlmProvider, resolved_input: &str) -> ToolResult {
    let response = llm
        .generate(&[Message::user(prompts::commonsense_prompt(resolved_input))], &[])
        .await
        .map_err(transport_failure)?;

    if let Some(answer) = extract_tag(&response, "answer") {
        return Ok(ToolSuccess { result: answer, sources: Vec::new() });
    }
    if let Some(reason) = extract_tag(&response, "replan") {
        return Err(ToolFailure {
            kind: ErrorKind::LlmReplanRequest,
            message: reason,
        });
    }
    Ok(ToolSuccess { result: response, sources: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tag_finds_inner_text() {
        assert_eq!(
            extract_tag("noise <answer>42</answer> trailing", "answer"),
            Some("42".to_string())
        );
    }

    #[test]
    fn extract_tag_missing_returns_none() {
        assert_eq!(extract_tag("no tags here", "answer"), None);
    }

    #[test]
    fn extract_last_code_block_picks_final_fence() {
        let text = "```python\nprint(1)\n```\nthen\n```python\nprint(2)\n```";
        assert_eq!(extract_last_code_block(text), Some("print(2)".to_string()));
    }

    #[test]
    fn extract_last_code_block_none_when_absent() {
        assert_eq!(extract_last_code_block("no code here"), None);
    }
}
