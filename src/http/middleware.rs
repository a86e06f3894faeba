//! Request metrics middleware.
//!
//! # Responsibilities
//! - Time every request and track the in-flight gauge
//! - Classify the request path into an endpoint label
//! - Capture request sizes and classify error responses
//! - Wrap the response body to count the bytes actually sent
//!
//! # Design Decisions
//! - Classification happens after the inner service answers, once per request
//! - Settings live behind `ArcSwap`; a reload never blocks requests
//! - The inner handler reports when processing began via a response extension

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::config::MetricsConfig;
use crate::endpoint::{EndpointMatcher, MatcherError};
use crate::http::body::CountingBody;
use crate::observability::errors::{classify_error, has_no_workers, is_error_status};
use crate::observability::metrics::{self, RequestObservation};

/// Marks the moment the inner handler started processing, after queueing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingStarted(pub Instant);

/// Metrics configuration paired with the matcher built from it.
#[derive(Debug)]
pub struct MetricsSettings {
    pub config: MetricsConfig,
    pub matcher: EndpointMatcher,
}

impl MetricsSettings {
    pub fn from_config(config: &MetricsConfig) -> Result<Self, MatcherError> {
        Ok(Self {
            matcher: EndpointMatcher::new(&config.endpoint_patterns)?,
            config: config.clone(),
        })
    }
}

/// Shared, swappable middleware state.
#[derive(Debug, Clone)]
pub struct MetricsState {
    settings: Arc<ArcSwap<MetricsSettings>>,
}

impl MetricsState {
    pub fn new(settings: MetricsSettings) -> Self {
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    pub fn from_config(config: &MetricsConfig) -> Result<Self, MatcherError> {
        Ok(Self::new(MetricsSettings::from_config(config)?))
    }

    /// The settings currently in effect.
    pub fn load(&self) -> Arc<MetricsSettings> {
        self.settings.load_full()
    }

    /// Build fresh settings and swap them in.
    ///
    /// On error the current settings stay active.
    pub fn reload(&self, config: &MetricsConfig) -> Result<(), MatcherError> {
        let settings = MetricsSettings::from_config(config)?;
        tracing::info!(
            rules = settings.matcher.rule_count(),
            matching = settings.matcher.is_enabled(),
            "Endpoint rules reloaded"
        );
        self.settings.store(Arc::new(settings));
        Ok(())
    }
}

/// Keeps the in-flight gauge balanced even if the request future is dropped.
struct QueueGuard;

impl QueueGuard {
    fn enter() -> Self {
        metrics::queue_enter();
        Self
    }
}

impl Drop for QueueGuard {
    fn drop(&mut self) {
        metrics::queue_exit();
    }
}

/// Middleware function recording request metrics.
pub async fn metrics_middleware(
    State(state): State<MetricsState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let settings = state.load();
    if !settings.config.enabled {
        return next.run(request).await;
    }

    let arrival = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let request_size = body_size(request.headers(), request.body());

    let guard = QueueGuard::enter();
    let response = next.run(request).await;
    let finished = Instant::now();
    drop(guard);

    let endpoint = settings.matcher.match_path(&path);
    let status = response.status();
    let processing_started = response
        .extensions()
        .get::<ProcessingStarted>()
        .map(|p| p.0)
        .unwrap_or(arrival);

    let error = is_error_status(status).then(|| classify_error(status, response.headers()));

    let observation = RequestObservation {
        method,
        endpoint,
        status,
        total: finished.saturating_duration_since(arrival),
        queue: processing_started.saturating_duration_since(arrival),
        processing: finished.saturating_duration_since(processing_started),
        request_size,
        error,
        no_workers: has_no_workers(response.headers()),
    };

    tracing::trace!(
        method = %observation.method,
        endpoint = %observation.endpoint,
        status = %status,
        "Request recorded"
    );
    metrics::record_request(&observation, &settings.config);

    if !settings.config.collect_sizes {
        return response;
    }
    let RequestObservation {
        method, endpoint, ..
    } = observation;
    response.map(|body| {
        Body::new(CountingBody::new(body, move |sent| {
            metrics::record_response_size(method, &endpoint, status, sent)
        }))
    })
}

/// Declared request body length, from `Content-Length` or an exact size hint.
fn body_size(headers: &HeaderMap, body: &Body) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .or_else(|| body.size_hint().exact())
        .unwrap_or(0)
}
