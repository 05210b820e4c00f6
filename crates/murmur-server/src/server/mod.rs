use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use murmur_relay::RelayHandle;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use crate::config::ServerConfig;

mod routes;

/// Handle to the relay hub as seen by WebSocket connections.
pub type Relay = RelayHandle<mpsc::Sender<String>>;

/// Server application state
pub struct AppState {
    /// Relay hub handle shared by every connection
    pub relay: Relay,
    /// Per-connection outbound queue length
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(relay: Relay, outbound_buffer: usize) -> Self {
        Self {
            relay,
            outbound_buffer: outbound_buffer.max(1),
        }
    }
}

/// Start the HTTP server and serve until `shutdown` is cancelled.
pub async fn start(config: &ServerConfig, relay: Relay, shutdown: CancellationToken) -> Result<()> {
    let state = Arc::new(AppState::new(relay, config.outbound_buffer));

    info!("Starting Axum HTTP server on {}", config.listen_addr);
    let listener = TcpListener::bind(config.listen_addr).await?;

    serve(listener, state, shutdown).await
}

/// Serve the router on an already bound listener.
async fn serve(listener: TcpListener, state: Arc<AppState>, shutdown: CancellationToken) -> Result<()> {
    let app = create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Create the Axum router with all routes and middleware
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::websocket::router())
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Health check endpoint (for load balancers)
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.relay.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "murmur-server",
                "version": env!("CARGO_PKG_VERSION"),
                "connections": stats.connections,
                "named": stats.named,
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "murmur-server",
                    "version": env!("CARGO_PKG_VERSION"),
                    "error": e.to_string(),
                })),
            )
        }
    }
}
