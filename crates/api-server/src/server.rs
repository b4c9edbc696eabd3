//! HTTP server and Prometheus exporter startup.

use crate::fan_rest;
use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use fanscore_core::AppConfig;
use fanscore_engine::EngagementEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the full route table over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Capture path
        .route("/v1/fans/activity", post(fan_rest::handle_activity))
        // Read paths
        .route("/v1/fans/:user_id/:artist_id", get(fan_rest::handle_fan_state))
        .route(
            "/v1/fans/:user_id/:artist_id/activity",
            get(fan_rest::handle_activity_feed),
        )
        .route(
            "/v1/fans/:user_id/:artist_id/achievements",
            get(fan_rest::handle_achievements),
        )
        .route(
            "/v1/fans/:user_id/:artist_id/milestones",
            get(fan_rest::handle_milestones),
        )
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    config: AppConfig,
    engine: Arc<EngagementEngine>,
}

impl ApiServer {
    pub fn new(config: AppConfig, engine: Arc<EngagementEngine>) -> Self {
        Self { config, engine }
    }

    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(AppState::new(self.engine.clone(), self.config.node_id.clone()));

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Install the Prometheus recorder and its scrape listener on the metrics port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
