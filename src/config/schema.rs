//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::str::FromStr;

use axum::http::uri::{Authority, InvalidUri};
use serde::{Deserialize, Serialize};

/// Root configuration for the metrics gateway.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream application the gateway forwards to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging and exporter settings.
    pub observability: ObservabilityConfig,

    /// Request metrics and endpoint classification.
    pub http_metrics: MetricsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:9000").
    pub address: String,

    /// Requests allowed in flight to the upstream at once.
    pub max_concurrent: usize,

    /// How long a request may wait for a free slot, in milliseconds.
    pub queue_timeout_ms: u64,
}

impl UpstreamConfig {
    /// The upstream `host[:port]`, as the forwarder will address it.
    pub fn authority(&self) -> Result<Authority, InvalidUri> {
        Authority::from_str(&self.address)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9000".to_string(),
            max_concurrent: 64,
            queue_timeout_ms: 5_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request metrics configuration (`[http_metrics]`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Collect request metrics at all.
    pub enabled: bool,

    /// Endpoint pattern matching and grouping.
    pub endpoint_patterns: EndpointPatternsConfig,

    /// Track request and response body sizes.
    pub collect_sizes: bool,

    /// Split total latency into queue time and processing time.
    pub collect_queue_time: bool,

    /// Histogram buckets for duration metrics, in seconds.
    pub duration_buckets: Vec<f64>,

    /// Histogram buckets for size metrics, in bytes.
    pub size_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint_patterns: EndpointPatternsConfig::default(),
            collect_sizes: true,
            collect_queue_time: true,
            duration_buckets: vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0],
            size_buckets: vec![
                1024.0,       // 1KB
                10_240.0,     // 10KB
                102_400.0,    // 100KB
                1_048_576.0,  // 1MB
                10_485_760.0, // 10MB
            ],
        }
    }
}

/// Endpoint pattern matching configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointPatternsConfig {
    /// Enable pattern matching. When off every path is labelled "other".
    pub enabled: bool,

    /// Intended ceiling on distinct pattern names. Advisory only.
    pub max_patterns: i64,

    /// Rules evaluated in order against the request path.
    pub rules: Vec<PatternRule>,

    /// Capacity of the classification cache (10000 when not positive).
    pub cache_size: i64,
}

impl Default for EndpointPatternsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_patterns: 100,
            rules: Vec::new(),
            cache_size: 10_000,
        }
    }
}

/// A single pattern matching rule.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PatternRule {
    /// Regex matched against the request path.
    pub pattern: String,

    /// Label value used when the pattern matches.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        let patterns = &config.http_metrics.endpoint_patterns;

        assert!(config.http_metrics.enabled);
        assert!(patterns.enabled);
        assert_eq!(patterns.cache_size, 10_000);
        assert_eq!(patterns.max_patterns, 100);
        assert!(patterns.rules.is_empty());
        assert_eq!(config.http_metrics.duration_buckets.len(), 9);
        assert_eq!(config.upstream.max_concurrent, 64);
    }

    #[test]
    fn test_rules_keep_file_order() {
        let config: ServerConfig = toml::from_str(
            r#"
            [http_metrics.endpoint_patterns]
            cache_size = -1

            [[http_metrics.endpoint_patterns.rules]]
            pattern = '^/api/users/\d+$'
            name = "user"

            [[http_metrics.endpoint_patterns.rules]]
            pattern = '^/api/.*$'
            name = "api"
            "#,
        )
        .unwrap();

        let patterns = &config.http_metrics.endpoint_patterns;
        assert_eq!(patterns.cache_size, -1);
        let names: Vec<_> = patterns.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["user", "api"]);
        assert_eq!(patterns.rules[0].pattern, r"^/api/users/\d+$");
    }
}
