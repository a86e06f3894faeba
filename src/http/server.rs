//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router forwarding every path to the upstream
//! - Wire up middleware (tracing, request ID, metrics, timeout)
//! - Apply reloaded endpoint rules while serving
//! - Run the uptime ticker and stop everything on shutdown

use std::time::Duration;

use axum::{middleware, routing::any, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{MetricsConfig, ServerConfig};
use crate::endpoint::MatcherError;
use crate::http::middleware::{metrics_middleware, MetricsState};
use crate::http::upstream::{forward_handler, UpstreamState};
use crate::observability::metrics;

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream address `{address}`: {source}")]
    InvalidUpstream {
        address: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error(transparent)]
    Matcher(#[from] MatcherError),
}

/// HTTP front end recording request metrics for an upstream application.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    metrics: MetricsState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let metrics = MetricsState::from_config(&config.http_metrics)?;
        let upstream =
            UpstreamState::new(&config.upstream).map_err(|source| ServerError::InvalidUpstream {
                address: config.upstream.address.clone(),
                source,
            })?;

        let router = Self::build_router(&config, upstream, metrics.clone());
        Ok(Self {
            router,
            config,
            metrics,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, upstream: UpstreamState, metrics: MetricsState) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(upstream)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until a shutdown signal arrives.
    ///
    /// Configurations received on `config_updates` replace the endpoint
    /// rules and metric switches. Histogram buckets are fixed once the
    /// exporter is installed, so a reload that changes them only logs a
    /// warning. Listener and upstream changes need a restart. Uptime is
    /// counted from startup whether or not request metrics are enabled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            rules = self.config.http_metrics.endpoint_patterns.rules.len(),
            "HTTP server starting"
        );

        tokio::spawn(metrics::run_uptime_ticker(shutdown.resubscribe()));

        let state = self.metrics.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reload_shutdown.recv() => break,
                    update = config_updates.recv() => match update {
                        Some(config) => {
                            if buckets_changed(&state.load().config, &config.http_metrics) {
                                tracing::warn!("Histogram bucket changes need a restart; keeping current buckets");
                            }
                            if let Err(e) = state.reload(&config.http_metrics) {
                                tracing::error!(error = %e, "Rejected endpoint rules, keeping current matcher");
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle to the live metrics settings.
    pub fn metrics_state(&self) -> MetricsState {
        self.metrics.clone()
    }

    /// The assembled router, for serving in-process.
    pub fn into_router(self) -> Router {
        self.router
    }
}

fn buckets_changed(current: &MetricsConfig, next: &MetricsConfig) -> bool {
    current.duration_buckets != next.duration_buckets || current.size_buckets != next.size_buckets
}
