//! Forwarding to the upstream application.
//!
//! # Responsibilities
//! - Bound concurrent upstream requests with a slot pool
//! - Answer 503 + `No-Workers: true` when no slot frees up in time
//! - Rewrite the request URI to the upstream and stream the response back

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::uri::{Authority, PathAndQuery, Scheme},
    http::{HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::Semaphore;

use crate::config::UpstreamConfig;
use crate::http::middleware::ProcessingStarted;
use crate::observability::errors::NO_WORKERS_HEADER;

/// State shared by the forwarding handler.
#[derive(Clone)]
pub struct UpstreamState {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    slots: Arc<Semaphore>,
    queue_timeout: Duration,
}

impl UpstreamState {
    pub fn new(config: &UpstreamConfig) -> Result<Self, axum::http::uri::InvalidUri> {
        let authority = config.authority()?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            authority,
            slots: Arc::new(Semaphore::new(config.max_concurrent.min(Semaphore::MAX_PERMITS))),
            queue_timeout: Duration::from_millis(config.queue_timeout_ms),
        })
    }

    /// Slots not currently held by a request.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

/// Forward the request to the upstream once a slot is free.
pub async fn forward_handler(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    let permit = match tokio::time::timeout(
        state.queue_timeout,
        state.slots.clone().acquire_owned(),
    )
    .await
    {
        Ok(Ok(permit)) => permit,
        _ => {
            tracing::warn!(
                path = %request.uri().path(),
                timeout = ?state.queue_timeout,
                "No free upstream slot"
            );
            return no_workers_response();
        }
    };

    let started = Instant::now();
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.authority.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    let mut response = match state.client.request(Request::from_parts(parts, body)).await {
        Ok(upstream) => {
            let (parts, body) = upstream.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, upstream = %state.authority, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    };
    drop(permit);

    response.extensions_mut().insert(ProcessingStarted(started));
    response
}

fn no_workers_response() -> Response {
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, "No free workers").into_response();
    response
        .headers_mut()
        .insert(NO_WORKERS_HEADER, HeaderValue::from_static("true"));
    response
}
