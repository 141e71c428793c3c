//! `RelayServer`: Axum HTTP + `WebSocket` presence server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use presence_core::SessionId;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::relay::Relay;
use crate::relay::reaper::spawn_reaper;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session table and protocol operations.
    pub relay: Arc<Relay>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Outbound queue depth per connection.
    pub send_queue: usize,
    /// Max inbound message size in bytes.
    pub max_message_size: usize,
}

/// Tasks started by [`RelayServer::listen`].
pub struct ServerHandle {
    /// Address actually bound (useful with port `0`).
    pub addr: SocketAddr,
    /// The HTTP accept loop.
    pub server: JoinHandle<()>,
    /// The eviction sweep.
    pub reaper: JoinHandle<()>,
}

impl ServerHandle {
    /// All background tasks, for a bounded shutdown wait.
    pub fn into_tasks(self) -> Vec<JoinHandle<()>> {
        vec![self.server, self.reaper]
    }
}

/// The presence relay server.
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics_handle: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        let relay = Arc::new(Relay::new(config.stale_timeout()));
        Self {
            config,
            relay,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics_handle: None,
        }
    }

    /// Attach a Prometheus handle so `/metrics` serves its output.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: Arc::clone(&self.relay),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics_handle.clone(),
            send_queue: self.config.send_queue_capacity,
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the listener, start the reaper and serve until shutdown.
    ///
    /// Fails with [`ServerError::InvalidConfig`] before binding if the
    /// configuration is unusable, and with [`ServerError::Bind`] if the
    /// address cannot be bound.
    pub async fn listen(&self) -> Result<ServerHandle, ServerError> {
        self.config.validate()?;
        let bind_addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;

        let token = self.shutdown.token();
        let reaper = spawn_reaper(
            Arc::clone(&self.relay),
            self.config.reap_interval(),
            token.clone(),
        );

        let router = self.router();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
            info!("server stopped");
        });

        info!(%addr, "presence relay listening");
        Ok(ServerHandle {
            addr,
            server,
            reaper,
        })
    }

    /// Get the relay.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET `/` and `/ws`: upgrade to a presence session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let id = SessionId::new();
    let relay = Arc::clone(&state.relay);
    let shutdown = state.shutdown.token();
    let send_queue = state.send_queue;

    ws.max_message_size(state.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| run_ws_session(socket, id, relay, send_queue, shutdown))
}

/// GET `/health`
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.relay.connection_count(),
        state.relay.session_count(),
        state.shutdown.is_shutting_down(),
    ))
}

/// GET `/metrics`
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => crate::metrics::render(&handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
