//! Gateway HTTP server - Axum router for the greeting and the four channel routes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_core::AgentFactory;

use crate::handlers;

/// Default cap on request bodies (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// State shared by every request. Holds no per-request data.
#[derive(Clone)]
pub struct GatewayState {
    pub factory: Arc<dyn AgentFactory>,
    pub start_time: Instant,
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
    max_body_bytes: usize,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, factory: Arc<dyn AgentFactory>) -> Self {
        let state = GatewayState {
            factory,
            start_time: Instant::now(),
        };
        Self {
            state,
            bind,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::index))
            .route("/voice", post(handlers::voice))
            .route("/chat", post(handlers::chat))
            .route("/email", post(handlers::email))
            .route("/text", post(handlers::text))
            .route("/api/status", get(handlers::status))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until `cancel` fires, then drain in-flight requests
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        info!("Gateway stopped");
        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
