//! SwarmOS Server: HTTP adapter for the agent swarm.
//!
//! Exposes the swarm-core orchestrator over:
//! - a REST API under `/api/v1` (users, workflow submission and queries)
//! - live progress streams over WebSocket and Server-Sent Events
//!
//! This crate can be used standalone or embedded in other applications
//! (e.g. the `swarm` CLI's `server` subcommand).

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use swarm_core::completion::build_client;
use swarm_core::state::{AppState, AppStateInner};
use swarm_core::{Database, SwarmConfig};

/// Configuration for the SwarmOS backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub swarm: SwarmConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            swarm: SwarmConfig::default(),
        }
    }
}

/// Create a shared `AppState` from a configuration.
///
/// Opens the database, builds the configured completion client and marks
/// workflows orphaned by a previous process as failed.
pub async fn create_app_state(config: SwarmConfig) -> Result<AppState, String> {
    config.validate()?;
    let db = Database::open(&config.database_path)
        .map_err(|e| format!("Failed to open database: {}", e))?;

    tracing::info!(
        "Completion backend: {} at {} (model {})",
        config.completion.provider.as_str(),
        config.completion.base_url,
        config.completion.model
    );
    let client = build_client(&config.completion);
    let state: AppState = Arc::new(AppStateInner::new(db, config, client));

    let recovered = state
        .orchestrator
        .recover_interrupted()
        .await
        .map_err(|e| format!("Failed to recover interrupted workflows: {}", e))?;
    if recovered > 0 {
        tracing::warn!("Marked {} interrupted workflow(s) as failed", recovered);
    }

    Ok(state)
}

/// Build the full application router with middleware applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/", axum::routing::get(root))
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the SwarmOS backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // The CLI may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swarm_core=info,swarm_server=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting SwarmOS backend server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(config.swarm.clone()).await?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("SwarmOS backend server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "SwarmOS online",
        "docs": "/api/v1",
    }))
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "swarm-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
