mod api;
mod events;
mod orchestrator;
mod scheduler;
mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use dp_domain::config::{Config, ConfigSeverity};
use dp_domain::event::Event;
use dp_providers::{OpenAiCompatProvider, SandboxCodeExecutor, SerperSearchProvider};
use dp_sessions::{CancelMap, SessionStore};

use api::build_router;
use events::EventBus;
use scheduler::RunScheduler;
use state::{ApiState, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var("DEEPPROBE_CONFIG").ok().map(std::path::PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!(message = %issue.message, "configuration warning"),
            ConfigSeverity::Error => tracing::error!(message = %issue.message, "configuration error"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("refusing to start with invalid configuration");
    }

    let llm_api_key = std::env::var(&config.llm.api_key_env).unwrap_or_default();
    let search_api_key = std::env::var(&config.search_provider.api_key_env).unwrap_or_default();

    let llm = Arc::new(OpenAiCompatProvider::new(
        config.llm.base_url.clone(),
        llm_api_key,
        config.llm.model.clone(),
        config.llm.request_timeout_seconds,
    )?);
    let search = Arc::new(SerperSearchProvider::new(
        config.search_provider.base_url.clone(),
        search_api_key,
        &config.search_provider.provider,
    )?);
    let code_executor = Arc::new(SandboxCodeExecutor::new(
        config.code_executor.interpreter.clone(),
        config.code_executor.timeout_seconds,
    ));

    let config = Arc::new(config);
    let app_state = AppState {
        config: config.clone(),
        llm,
        search,
        code_executor,
        sessions: Arc::new(SessionStore::new()),
        cancel_map: Arc::new(CancelMap::new()),
        events: Arc::new(EventBus::new(1024)),
        search_concurrency: Arc::new(Semaphore::new(config.orchestrator.max_concurrent_searches)),
        started_at: Instant::now(),
    };

    dp_sessions::spawn_sweeper(
        app_state.sessions.clone(),
        chrono::Duration::seconds(config.sessions.idle_ttl_seconds as i64),
        Duration::from_secs(config.sessions.sweep_interval_seconds),
    );
    spawn_heartbeat(app_state.clone(), Duration::from_secs(config.event_bus.heartbeat_interval_seconds));

    let scheduler = Arc::new(RunScheduler::new(app_state.clone()));
    let api_state = ApiState { app: app_state, scheduler };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "deepprobe listening");

    axum::serve(listener, build_router(api_state)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().with_target(true).init();
}

/// Publishes a `heartbeat` event on a fixed interval, but only while at
/// least one client is connected — skips idle background work when nobody
/// is listening.
fn spawn_heartbeat(state: AppState, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let client_count = state.events.client_count();
            if client_count > 0 {
                state.events.publish(Event::Heartbeat {
                    server_time: chrono::Utc::now(),
                    client_count,
                });
            }
        }
    });
}
