//! HTTP server for Prometheus metrics endpoint.

use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Creates a config with a custom port.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Registry shared between the server and whoever feeds it snapshots.
///
/// Prometheus metrics are internally synchronized, so no lock is needed.
#[derive(Clone)]
pub struct MetricsState {
    registry: Arc<MetricsRegistry>,
}

impl MetricsState {
    /// Updates the metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
    }
}

/// HTTP server for exposing Prometheus metrics.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: MetricsState,
}

impl MetricsServer {
    /// Creates a new metrics server.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            state: MetricsState {
                registry: Arc::new(registry),
            },
        }
    }

    /// Returns a handle for updating metrics.
    pub fn state(&self) -> MetricsState {
        self.state.clone()
    }

    /// Starts the HTTP server.
    ///
    /// This method runs the server until it is shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            "Metrics server listening"
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    match state.registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::stream::StatsSnapshot;

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(8080);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_state_handle_updates_shared_registry() {
        let server = MetricsServer::new(
            MetricsServerConfig::default(),
            MetricsRegistry::new().unwrap(),
        );
        let stats = StatsSnapshot {
            sessions_opened: 2,
            ..Default::default()
        };
        server
            .state()
            .update(&MetricsSnapshot::from_stats(stats, SessionState::Ready));

        let output = server.state.registry.encode().unwrap();
        assert!(output.contains("qr_camera_sessions_opened_total 2"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
