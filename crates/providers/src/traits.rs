use dp_domain::error::Result;
use dp_domain::message::Message;

/// The LLM provider contract consumed by the core: a plain
/// request/response text generator. No streaming is assumed, and
/// implementations must be safely callable concurrently (no provider holds a
/// `&mut self` across calls — interior state, if any, is synchronized).
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text from a conversation. `stop_tokens`, when non-empty,
    /// asks the provider to stop generation early if one is produced.
    async fn generate(&self, messages: &[Message], stop_tokens: &[String]) -> Result<String>;
}

/// A single organic search result as returned by the web-search provider.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// The web-search provider contract: returns organic results ordered by
/// server-assigned relevance.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn get_sources(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// The sandboxed code executor contract: runs a Python source string to
/// completion and returns its captured stdout, or fails.
#[async_trait::async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn run(&self, python_source: &str) -> Result<String>;
}

/// The reranker/content-extractor contract: turns a truncated list of
/// search results into a single context block the Search adapter feeds to
/// the SUMMARY template. `pro_mode` mirrors the original's richer-extraction
/// toggle; the default implementation ignores it and always concatenates
/// title/link/snippet.
pub fn build_context_block(sources: &[SearchResult], query: &str, pro_mode: bool) -> String {
    let _ = pro_mode;
    let mut blocks = Vec::with_capacity(sources.len());
    for (idx, source) in sources.iter().enumerate() {
        blocks.push(format!(
            "{idx}. [{}]({})\n{}",
            source.title, source.link, source.snippet
        ));
    }
    format!(
        "## Search Results for: {query}\n\n{}",
        blocks.join("\n\n")
    )
}
