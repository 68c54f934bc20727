use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::sessions;
use crate::events::event_stream;
use crate::state::ApiState;

/// Build the full HTTP + WebSocket route table over `ApiState`.
pub fn build_router(state: ApiState) -> Router {
    let cors = build_cors_layer(&state.app.config.server.cors.allowed_origins);

    Router::new()
        .route("/api/v1/search", post(sessions::start_search))
        .route("/api/v1/search/:id/status", get(sessions::get_status))
        .route("/api/v1/search/:id", get(sessions::get_session))
        .route("/api/v1/search/:id/cancel", post(sessions::cancel_search))
        .route("/api/v1/new-chat", post(sessions::new_chat))
        .route("/health", get(sessions::health))
        .route("/stats", get(sessions::stats))
        .route("/ws", get(event_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds a CORS layer from `cors.allowed_origins`. Entries are either an
/// exact origin (`https://app.example.com`) or a `scheme://host:*`
/// wildcard-port form (matches any port on that scheme+host) — the form the
/// default config ships for local development.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(tower_http::cors::Any);
    }

    let patterns = allowed_origins.to_vec();
    layer.allow_origin(AllowOrigin::predicate(move |origin, _request_parts| {
        let Ok(origin) = origin.to_str() else { return false };
        patterns.iter().any(|pattern| origin_matches(pattern, origin))
    }))
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.strip_suffix(":*") {
        Some(prefix) => origin.starts_with(prefix) && origin[prefix.len()..].starts_with(':'),
        None => pattern == origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_port_pattern_matches_any_port() {
        assert!(origin_matches("http://localhost:*", "http://localhost:5173"));
        assert!(origin_matches("http://localhost:*", "http://localhost:3000"));
        assert!(!origin_matches("http://localhost:*", "https://localhost:3000"));
        assert!(!origin_matches("http://localhost:*", "http://evil.com:3000"));
    }

    #[test]
    fn exact_pattern_requires_exact_match() {
        assert!(origin_matches("https://example.com", "https://example.com"));
        assert!(!origin_matches("https://example.com", "https://example.com:8443"));
    }
}
