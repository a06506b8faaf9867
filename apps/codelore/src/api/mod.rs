//! # HTTP API
//!
//! Axum-based REST surface over the knowledge store. All mutation and
//! query endpoints are JSON over POST/GET; the store itself stays
//! synchronous and is shared behind an async `RwLock`.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod types;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use codelore_core::{LoreError, Store};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum accepted request body (2 MB). Facts payloads from an analyzer
/// are small; anything bigger is a client bug.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }
}

/// Build the CORS layer from `CODELORE_CORS_ORIGINS`.
///
/// Unset or empty means localhost-only development defaults. `*` opts
/// into a permissive policy and is logged loudly. Anything else is a
/// comma-separated origin allowlist; unparseable entries are skipped.
fn build_cors_layer() -> CorsLayer {
    let configured = std::env::var("CODELORE_CORS_ORIGINS").unwrap_or_default();

    if configured.trim() == "*" {
        tracing::warn!("CORS is fully permissive (CODELORE_CORS_ORIGINS=*), do not use in production");
        return CorsLayer::permissive();
    }

    let mut origins: Vec<HeaderValue> = Vec::new();
    if configured.trim().is_empty() {
        for origin in [
            "http://localhost:3000",
            "http://localhost:8080",
            "http://127.0.0.1:3000",
            "http://127.0.0.1:8080",
        ] {
            if let Ok(value) = HeaderValue::from_str(origin) {
                origins.push(value);
            }
        }
        tracing::info!("CORS restricted to localhost development origins");
    } else {
        for origin in configured.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            match HeaderValue::from_str(origin) {
                Ok(value) => {
                    tracing::info!(origin = %origin, "CORS origin allowed");
                    origins.push(value);
                }
                Err(_) => {
                    tracing::warn!(origin = %origin, "skipping invalid CORS origin");
                }
            }
        }
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Assemble the full router with state and middleware layers.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Registration endpoints
        .route("/entity", post(handlers::register_entity))
        .route("/relationship", post(handlers::register_relationship))
        .route("/pattern", post(handlers::register_pattern))
        .route("/convention", post(handlers::register_convention))
        .route("/entity/observation", post(handlers::add_observation))
        // Query endpoints
        .route("/query/entities", post(handlers::query_entities))
        .route("/query/patterns", post(handlers::query_patterns))
        .route("/query/conventions", post(handlers::query_conventions))
        .route("/entity/{name}", get(handlers::entity_details))
        .route("/statistics", get(handlers::statistics))
        // Administration
        .route("/export", get(handlers::export))
        .route("/clear", post(handlers::clear))
        .route("/health", get(handlers::health));

    // Bearer auth only when a key is configured. The health endpoint
    // stays open either way so probes keep working.
    if auth::get_api_key_from_env().is_some() {
        tracing::info!("API key authentication enabled");
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    } else {
        tracing::warn!("API key authentication disabled (CODELORE_API_KEY not set)");
    }

    let rate_limit = middleware::get_rate_limit_from_env();
    if rate_limit > 0 {
        tracing::info!(requests_per_second = rate_limit, "rate limiting enabled");
        let limiter = middleware::create_rate_limiter(rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::warn!("rate limiting disabled (CODELORE_RATE_LIMIT=0)");
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(addr: &str, store: Store) -> Result<(), LoreError> {
    let state = AppState::new(store);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LoreError::Persistence(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(addr = %addr, "knowledge API listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| LoreError::Persistence(format!("server error: {e}")))?;

    Ok(())
}
