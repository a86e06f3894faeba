//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, bucket layouts and upstream limits
//! - Compile endpoint patterns so bad regexes are caught before startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - `max_patterns` is advisory: exceeding it only logs a warning

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::{EndpointPatternsConfig, ServerConfig};
use crate::endpoint::rules::{MatcherError, Rule};

/// A single semantic problem found in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.address: `{value}` is not a valid host[:port]")]
    InvalidUpstream { value: String },

    #[error("upstream.max_concurrent must be between 1 and {max}")]
    ConcurrencyOutOfRange { max: usize },

    #[error("{field} must not be empty")]
    EmptyBuckets { field: &'static str },

    #[error("{field} must be positive and strictly increasing")]
    UnorderedBuckets { field: &'static str },

    #[error("endpoint rule #{index} has an empty name")]
    EmptyRuleName { index: usize },

    #[error(transparent)]
    Pattern(#[from] MatcherError),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);
    if config.upstream.authority().is_err() {
        errors.push(ValidationError::InvalidUpstream {
            value: config.upstream.address.clone(),
        });
    }
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if !(1..=Semaphore::MAX_PERMITS).contains(&config.upstream.max_concurrent) {
        errors.push(ValidationError::ConcurrencyOutOfRange {
            max: Semaphore::MAX_PERMITS,
        });
    }

    let metrics = &config.http_metrics;
    check_buckets("http_metrics.duration_buckets", &metrics.duration_buckets, &mut errors);
    check_buckets("http_metrics.size_buckets", &metrics.size_buckets, &mut errors);

    if metrics.endpoint_patterns.enabled {
        check_rules(&metrics.endpoint_patterns, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_buckets(field: &'static str, buckets: &[f64], errors: &mut Vec<ValidationError>) {
    if buckets.is_empty() {
        errors.push(ValidationError::EmptyBuckets { field });
        return;
    }
    let positive = buckets.iter().all(|b| b.is_finite() && *b > 0.0);
    let increasing = buckets.windows(2).all(|w| w[0] < w[1]);
    if !positive || !increasing {
        errors.push(ValidationError::UnorderedBuckets { field });
    }
}

fn check_rules(config: &EndpointPatternsConfig, errors: &mut Vec<ValidationError>) {
    for (index, rule) in config.rules.iter().enumerate() {
        if rule.name.is_empty() {
            errors.push(ValidationError::EmptyRuleName { index });
        }
        if let Err(e) = Rule::compile(index, &rule.pattern, &rule.name) {
            errors.push(e.into());
        }
    }

    let distinct: HashSet<&str> = config.rules.iter().map(|r| r.name.as_str()).collect();
    if config.max_patterns > 0 && distinct.len() as i64 > config.max_patterns {
        tracing::warn!(
            distinct = distinct.len(),
            max_patterns = config.max_patterns,
            "More distinct endpoint names than max_patterns; the limit is not enforced"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PatternRule;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.max_concurrent = 0;
        config.http_metrics.duration_buckets = vec![0.5, 0.1];
        config.http_metrics.size_buckets.clear();
        config.http_metrics.endpoint_patterns.rules = vec![
            PatternRule {
                pattern: "^/ok$".into(),
                name: String::new(),
            },
            PatternRule {
                pattern: "^/users/(".into(),
                name: "users".into(),
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(matches!(errors[0], ValidationError::InvalidAddress { field: "listener.bind_address", .. }));
        assert!(matches!(errors[1], ValidationError::ConcurrencyOutOfRange { .. }));
        assert!(matches!(errors[2], ValidationError::UnorderedBuckets { .. }));
        assert!(matches!(errors[3], ValidationError::EmptyBuckets { .. }));
        assert!(matches!(errors[4], ValidationError::EmptyRuleName { index: 0 }));
        assert!(matches!(errors[5], ValidationError::Pattern(_)));
    }

    #[test]
    fn test_concurrency_upper_bound() {
        let mut config = ServerConfig::default();
        config.upstream.max_concurrent = usize::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[..], [ValidationError::ConcurrencyOutOfRange { .. }]));

        config.upstream.max_concurrent = Semaphore::MAX_PERMITS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_upstream_hostname_is_valid() {
        let mut config = ServerConfig::default();
        config.upstream.address = "localhost:9000".into();
        assert!(validate_config(&config).is_ok());

        config.upstream.address = "not a host".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[..], [ValidationError::InvalidUpstream { .. }]));
    }

    #[test]
    fn test_disabled_patterns_are_not_compiled() {
        let mut config = ServerConfig::default();
        config.http_metrics.endpoint_patterns.enabled = false;
        config.http_metrics.endpoint_patterns.rules = vec![PatternRule {
            pattern: "(".into(),
            name: "broken".into(),
        }];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_max_patterns_is_advisory() {
        let mut config = ServerConfig::default();
        config.http_metrics.endpoint_patterns.max_patterns = 1;
        config.http_metrics.endpoint_patterns.rules = vec![
            PatternRule { pattern: "^/a".into(), name: "a".into() },
            PatternRule { pattern: "^/b".into(), name: "b".into() },
        ];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_skipped_when_exporter_off() {
        let mut config = ServerConfig::default();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
    }
}
