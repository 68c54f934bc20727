use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub event_bus: EventBusConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search_provider: SearchProviderConfig,
    #[serde(default)]
    pub code_executor: CodeExecutorConfig,
}

impl Config {
    /// Load from an optional TOML file, then let environment variables
    /// override individual scalar fields. Missing file or unset env vars are
    /// not errors; every field already has a default.
    pub fn load(path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw)
                    .map_err(|e| crate::error::Error::Config(format!("{p:?}: {e}")))?
            }
            _ => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DEEPPROBE_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("DEEPPROBE_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("DEEPPROBE_MAX_CONCURRENT_SEARCHES") {
            if let Ok(n) = v.parse() {
                self.orchestrator.max_concurrent_searches = n;
            }
        }
        if let Ok(v) = std::env::var("DEEPPROBE_SEARCH_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse() {
                self.orchestrator.search_timeout_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("DEEPPROBE_MAX_REPLAN_ITER") {
            if let Ok(n) = v.parse() {
                self.orchestrator.max_replan_iter = n;
            }
        }
        if let Ok(v) = std::env::var("DEEPPROBE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DEEPPROBE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("DEEPPROBE_SEARCH_BASE_URL") {
            self.search_provider.base_url = v;
        }
    }

    /// Validate the loaded configuration, returning a list of issues. The
    /// caller bails out before binding the listener if any issue is
    /// [`ConfigSeverity::Error`].
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.orchestrator.max_replan_iter > 2 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: format!(
                    "orchestrator.max_replan_iter = {} exceeds the implementation ceiling of 2",
                    self.orchestrator.max_replan_iter
                ),
            });
        }
        if self.orchestrator.max_concurrent_searches == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "orchestrator.max_concurrent_searches must be at least 1".into(),
            });
        }
        if self.orchestrator.recursion_limit == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "orchestrator.recursion_limit must be at least 1".into(),
            });
        }
        if self.search.max_sources_per_search == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "search.max_sources_per_search is 0; search steps will cite no sources"
                    .into(),
            });
        }
        if self.server.cors.allowed_origins.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "server.cors.allowed_origins is empty; no browser client will be able to call the API".into(),
            });
        }
        if self.llm.base_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "llm.base_url must be set".into(),
            });
        }

        issues
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Supports exact origins and a `scheme://host:*`
    /// wildcard-port form. Use `["*"]` for permissive (not recommended).
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

fn d_port() -> u16 {
    3210
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "d_max_concurrent_searches")]
    pub max_concurrent_searches: usize,
    #[serde(default = "d_search_timeout_seconds")]
    pub search_timeout_seconds: u64,
    #[serde(default = "d_max_replan_iter")]
    pub max_replan_iter: u32,
    #[serde(default = "d_recursion_limit")]
    pub recursion_limit: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: d_max_concurrent_searches(),
            search_timeout_seconds: d_search_timeout_seconds(),
            max_replan_iter: d_max_replan_iter(),
            recursion_limit: d_recursion_limit(),
        }
    }
}

fn d_max_concurrent_searches() -> usize {
    10
}
fn d_search_timeout_seconds() -> u64 {
    300
}
fn d_max_replan_iter() -> u32 {
    1
}
fn d_recursion_limit() -> u32 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_idle_ttl_seconds")]
    pub idle_ttl_seconds: u64,
    #[serde(default = "d_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: d_idle_ttl_seconds(),
            sweep_interval_seconds: d_sweep_interval_seconds(),
        }
    }
}

fn d_idle_ttl_seconds() -> u64 {
    1800
}
fn d_sweep_interval_seconds() -> u64 {
    300
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event bus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "d_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: d_heartbeat_interval_seconds(),
        }
    }
}

fn d_heartbeat_interval_seconds() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "d_max_sources_per_search")]
    pub max_sources_per_search: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_sources_per_search: d_max_sources_per_search(),
        }
    }
}

fn d_max_sources_per_search() -> usize {
    3
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// External collaborators — concrete default adapter config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_llm_base_url")]
    pub base_url: String,
    #[serde(default = "d_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_llm_model")]
    pub model: String,
    #[serde(default = "d_llm_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_llm_base_url(),
            api_key_env: d_llm_api_key_env(),
            model: d_llm_model(),
            request_timeout_seconds: d_llm_request_timeout_seconds(),
        }
    }
}

fn d_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_llm_api_key_env() -> String {
    "DEEPPROBE_LLM_API_KEY".into()
}
fn d_llm_model() -> String {
    "gpt-4o-mini".into()
}
fn d_llm_request_timeout_seconds() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProviderConfig {
    #[serde(default = "d_search_provider_base_url")]
    pub base_url: String,
    #[serde(default = "d_search_provider_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_search_provider_kind")]
    pub provider: String,
}

impl Default for SearchProviderConfig {
    fn default() -> Self {
        Self {
            base_url: d_search_provider_base_url(),
            api_key_env: d_search_provider_api_key_env(),
            provider: d_search_provider_kind(),
        }
    }
}

fn d_search_provider_base_url() -> String {
    "https://google.serper.dev/search".into()
}
fn d_search_provider_api_key_env() -> String {
    "DEEPPROBE_SEARCH_API_KEY".into()
}
fn d_search_provider_kind() -> String {
    "serper".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExecutorConfig {
    #[serde(default = "d_code_interpreter")]
    pub interpreter: String,
    #[serde(default = "d_code_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for CodeExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: d_code_interpreter(),
            timeout_seconds: d_code_timeout_seconds(),
        }
    }
}

fn d_code_interpreter() -> String {
    "python3".into()
}
fn d_code_timeout_seconds() -> u64 {
    20
}
