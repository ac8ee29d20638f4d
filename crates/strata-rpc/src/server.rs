//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use mini_moka::sync::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{Catalog, CatalogSession};
use tokio::sync::Mutex;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Requests handled at once. Session waits hold a slot while they wait.
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Sessions untouched for this long are dropped.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound on open sessions; the least recently used go first.
const MAX_SESSIONS: u64 = 10_000;

/// A session is locked for the whole of one request, including waits.
pub type SharedSession = Arc<Mutex<CatalogSession>>;

/// Application state shared across handlers.
pub struct AppState {
    /// Catalog engine shared by every request and session
    pub catalog: Arc<Catalog>,
    /// Open catalog sessions by id. Every lookup resets the idle clock.
    pub sessions: Cache<String, SharedSession>,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_session_idle(catalog, SESSION_IDLE_TIMEOUT)
    }

    /// State whose sessions expire after `idle` without a request.
    pub fn with_session_idle(catalog: Arc<Catalog>, idle: Duration) -> Self {
        Self {
            catalog,
            sessions: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_idle(idle)
                .build(),
        }
    }
}

/// Router with the RPC and health endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the JSON-RPC HTTP server with default session settings.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    catalog: Arc<Catalog>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    serve(Arc::new(AppState::new(catalog)), host, port).await
}

/// Start the JSON-RPC HTTP server over prepared state.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
