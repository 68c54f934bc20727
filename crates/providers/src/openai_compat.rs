//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, Together, and
//! any other endpoint that follows the OpenAI chat completions contract.
//! This is the default concrete [`LlmProvider`] — the core only ever calls
//! `generate`, never anything provider-specific.

use serde_json::{json, Value};

use dp_domain::error::{Error, Result};
use dp_domain::message::{Message, Role};

use crate::traits::LlmProvider;
use crate::util::from_reqwest;

pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout_seconds: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(request_timeout_seconds))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate(&self, messages: &[Message], stop_tokens: &[String]) -> Result<String> {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": Self::role_str(m.role),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": wire_messages,
        });
        if !stop_tokens.is_empty() {
            body["stop"] = json!(stop_tokens);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "openai_compat".into(),
                message: format!("{status}: {text}"),
            });
        }

        let parsed: Value = response.json().await.map_err(from_reqwest)?;
        parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Provider {
                provider: "openai_compat".into(),
                message: "missing choices[0].message.content in response".into(),
            })
    }
}
