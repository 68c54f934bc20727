//! serper.dev-compatible web search adapter.
//!
//! Grounded in the original service's `web_search` helper: a single GET
//! request against `google.serper.dev/search` (or the `serpapi.com` organic
//! search endpoint, selected by `provider`), returning an `organic` array of
//! `{title, link, snippet}` records.

use serde_json::Value;

use dp_domain::error::Result;

use crate::traits::{SearchProvider, SearchResult};
use crate::util::from_reqwest;

pub struct SerperSearchProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    organic_key: &'static str,
}

impl SerperSearchProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, provider: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(from_reqwest)?;
        let organic_key = if provider == "serpapi" {
            "organic_results"
        } else {
            "organic"
        };
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
            organic_key,
        })
    }
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    async fn get_sources(&self, query: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(from_reqwest)?;

        let body: Value = response.json().await.map_err(from_reqwest)?;

        let organic = body
            .get(self.organic_key)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let results = organic
            .into_iter()
            .filter_map(|page| {
                Some(SearchResult {
                    title: page.get("title")?.as_str()?.to_string(),
                    link: page.get("link")?.as_str()?.to_string(),
                    snippet: page
                        .get("snippet")
                        .and_then(|s| s.as_str())
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect();

        Ok(results)
    }
}
