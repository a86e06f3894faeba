//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define request metrics (counts, latency breakdown, sizes, errors)
//! - Install the Prometheus exporter with configured histogram buckets
//! - Track gateway uptime and in-flight requests
//!
//! # Metrics
//! - `http_request_total` (counter): requests by status
//! - `http_request_duration_seconds` (histogram): total latency by status
//! - `http_requests_by_endpoint_total` (counter): method, endpoint, status
//! - `http_duration_by_endpoint_seconds` (histogram): method, endpoint
//! - `http_queue_time_seconds` / `http_processing_time_seconds` (histograms)
//! - `http_request_size_bytes` / `http_response_size_bytes` (histograms)
//! - `http_errors_total` (counter): type, endpoint, status
//! - `http_requests_queue` (gauge): requests currently in flight
//! - `http_no_free_workers_total` (counter)
//! - `http_uptime_seconds` (counter)
//!
//! # Design Decisions
//! - The endpoint label comes from the endpoint matcher, never the raw path
//! - Size histograms skip zero-length bodies
//! - Response size counts bytes sent, recorded when the body completes
//! - Queue/processing and size metrics are individually switchable

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::sync::broadcast;

use crate::config::MetricsConfig;
use crate::observability::errors::ErrorType;

pub const REQUESTS_QUEUE: &str = "http_requests_queue";
pub const NO_FREE_WORKERS: &str = "http_no_free_workers_total";
pub const REQUEST_TOTAL: &str = "http_request_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const UPTIME: &str = "http_uptime_seconds";
pub const QUEUE_TIME: &str = "http_queue_time_seconds";
pub const PROCESSING_TIME: &str = "http_processing_time_seconds";
pub const REQUEST_SIZE: &str = "http_request_size_bytes";
pub const RESPONSE_SIZE: &str = "http_response_size_bytes";
pub const REQUESTS_BY_ENDPOINT: &str = "http_requests_by_endpoint_total";
pub const DURATION_BY_ENDPOINT: &str = "http_duration_by_endpoint_seconds";
pub const ERRORS_TOTAL: &str = "http_errors_total";

const DURATION_HISTOGRAMS: [&str; 4] = [
    REQUEST_DURATION,
    QUEUE_TIME,
    PROCESSING_TIME,
    DURATION_BY_ENDPOINT,
];
const SIZE_HISTOGRAMS: [&str; 2] = [REQUEST_SIZE, RESPONSE_SIZE];

/// Everything measured about one completed request.
#[derive(Debug, Clone)]
pub struct RequestObservation {
    pub method: String,
    pub endpoint: Arc<str>,
    pub status: StatusCode,
    pub total: Duration,
    pub queue: Duration,
    pub processing: Duration,
    pub request_size: u64,
    pub error: Option<ErrorType>,
    pub no_workers: bool,
}

fn builder(config: &MetricsConfig) -> Result<PrometheusBuilder, BuildError> {
    let mut builder = PrometheusBuilder::new();
    for name in DURATION_HISTOGRAMS {
        builder = builder
            .set_buckets_for_metric(Matcher::Full(name.to_string()), &config.duration_buckets)?;
    }
    for name in SIZE_HISTOGRAMS {
        builder =
            builder.set_buckets_for_metric(Matcher::Full(name.to_string()), &config.size_buckets)?;
    }
    Ok(builder)
}

/// Install the global recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr, config: &MetricsConfig) -> Result<(), BuildError> {
    builder(config)?.with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Install the global recorder without an HTTP listener.
///
/// The returned handle renders the current exposition on demand.
pub fn install_recorder(config: &MetricsConfig) -> Result<PrometheusHandle, BuildError> {
    let handle = builder(config)?.install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_gauge!(REQUESTS_QUEUE, "Total number of queued requests.");
    describe_counter!(NO_FREE_WORKERS, "Total number of NoFreeWorkers occurrences.");
    describe_counter!(
        REQUEST_TOTAL,
        "Total number of handled http requests after server restart."
    );
    describe_histogram!(REQUEST_DURATION, Unit::Seconds, "HTTP request duration.");
    describe_counter!(UPTIME, Unit::Seconds, "Uptime in seconds");
    describe_histogram!(
        QUEUE_TIME,
        Unit::Seconds,
        "Time request spent waiting for a free upstream slot."
    );
    describe_histogram!(
        PROCESSING_TIME,
        Unit::Seconds,
        "Time spent processing the request by the upstream."
    );
    describe_histogram!(REQUEST_SIZE, Unit::Bytes, "HTTP request body size in bytes.");
    describe_histogram!(RESPONSE_SIZE, Unit::Bytes, "HTTP response body size in bytes.");
    describe_counter!(
        REQUESTS_BY_ENDPOINT,
        "Total number of HTTP requests by endpoint pattern."
    );
    describe_histogram!(
        DURATION_BY_ENDPOINT,
        Unit::Seconds,
        "HTTP request duration by endpoint pattern."
    );
    describe_counter!(ERRORS_TOTAL, "Total number of HTTP errors classified by type.");
}

/// A request entered the gateway.
pub fn queue_enter() {
    gauge!(REQUESTS_QUEUE).increment(1.0);
}

/// A request left the gateway.
pub fn queue_exit() {
    gauge!(REQUESTS_QUEUE).decrement(1.0);
}

/// Record every per-request metric enabled in `config`.
pub fn record_request(obs: &RequestObservation, config: &MetricsConfig) {
    let status = obs.status.as_u16().to_string();
    let method = obs.method.clone();
    let endpoint = obs.endpoint.to_string();

    counter!(REQUEST_TOTAL, "status" => status.clone()).increment(1);
    histogram!(REQUEST_DURATION, "status" => status.clone()).record(obs.total.as_secs_f64());

    if config.collect_queue_time {
        histogram!(QUEUE_TIME, "method" => method.clone(), "endpoint" => endpoint.clone())
            .record(obs.queue.as_secs_f64());
        histogram!(PROCESSING_TIME, "method" => method.clone(), "endpoint" => endpoint.clone())
            .record(obs.processing.as_secs_f64());
    }

    if config.collect_sizes && obs.request_size > 0 {
        histogram!(REQUEST_SIZE, "method" => method.clone(), "endpoint" => endpoint.clone())
            .record(obs.request_size as f64);
    }

    counter!(
        REQUESTS_BY_ENDPOINT,
        "method" => method.clone(),
        "endpoint" => endpoint.clone(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(DURATION_BY_ENDPOINT, "method" => method, "endpoint" => endpoint.clone())
        .record(obs.total.as_secs_f64());

    if let Some(error) = obs.error {
        counter!(
            ERRORS_TOTAL,
            "type" => error.as_str(),
            "endpoint" => endpoint,
            "status" => status
        )
        .increment(1);
    }

    if obs.no_workers {
        counter!(NO_FREE_WORKERS).increment(1);
    }
}

/// Record the number of response body bytes actually sent.
///
/// Called once the body has finished streaming, so it runs after
/// `record_request` for the same request.
pub fn record_response_size(method: String, endpoint: &str, status: StatusCode, bytes: u64) {
    if bytes == 0 {
        return;
    }
    histogram!(
        RESPONSE_SIZE,
        "method" => method,
        "endpoint" => endpoint.to_string(),
        "status" => status.as_u16().to_string()
    )
    .record(bytes as f64);
}

/// Increment the uptime counter once per second until shutdown.
pub async fn run_uptime_ticker(mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("Uptime ticker stopped");
                return;
            }
            _ = ticker.tick() => {
                counter!(UPTIME).increment(1);
            }
        }
    }
}
