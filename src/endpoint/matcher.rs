//! Endpoint matching logic.
//!
//! # Responsibilities
//! - Reduce a request path to a configured endpoint label
//! - Consult the recency cache before evaluating any regex
//! - Cache every outcome, including the fallback
//!
//! # Design Decisions
//! - Path matching is case-sensitive, against the literal path
//! - Rules are evaluated in configuration order, first match wins
//! - A disabled matcher is a separate constructor, not a runtime branch

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::schema::EndpointPatternsConfig;
use crate::endpoint::cache::EndpointCache;
use crate::endpoint::rules::{MatcherError, RuleSet};

/// Label assigned to every path no rule matches.
pub const FALLBACK_LABEL: &str = "other";

/// Cache capacity used when the configured size is not positive.
pub const DEFAULT_CACHE_SIZE: usize = 10_000;

/// Classifies request paths into a bounded set of labels.
#[derive(Debug)]
pub struct EndpointMatcher {
    // Never replaced after construction; reloads build a new matcher.
    rules: RwLock<RuleSet>,
    cache: EndpointCache<Arc<str>>,
    fallback: Arc<str>,
    enabled: bool,
}

impl EndpointMatcher {
    /// Build a matcher from configuration.
    ///
    /// Fails if any rule pattern does not compile.
    pub fn new(config: &EndpointPatternsConfig) -> Result<Self, MatcherError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let rules = RuleSet::compile(&config.rules)?;
        let cache_size = effective_cache_size(config.cache_size);

        tracing::debug!(
            rules = rules.len(),
            cache_size,
            "Endpoint matcher compiled"
        );

        Ok(Self {
            rules: RwLock::new(rules),
            cache: EndpointCache::new(cache_size),
            fallback: Arc::from(FALLBACK_LABEL),
            enabled: true,
        })
    }

    /// A matcher that maps every path to the fallback label.
    pub fn disabled() -> Self {
        Self {
            rules: RwLock::new(RuleSet::default()),
            cache: EndpointCache::new(1),
            fallback: Arc::from(FALLBACK_LABEL),
            enabled: false,
        }
    }

    /// Return the endpoint label for `path`.
    pub fn match_path(&self, path: &str) -> Arc<str> {
        if let Some(label) = self.cache.get(path) {
            return label;
        }

        let rules = self.rules.read();
        let label = rules
            .first_match(path)
            .unwrap_or(&self.fallback)
            .clone();
        self.cache.set(path, label.clone());
        label
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

/// Clamp a configured cache size, treating non-positive values as unset.
pub fn effective_cache_size(configured: i64) -> usize {
    if configured <= 0 {
        DEFAULT_CACHE_SIZE
    } else {
        usize::try_from(configured).unwrap_or(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PatternRule;

    fn config(rules: &[(&str, &str)]) -> EndpointPatternsConfig {
        EndpointPatternsConfig {
            enabled: true,
            max_patterns: 100,
            cache_size: 16,
            rules: rules
                .iter()
                .map(|(pattern, name)| PatternRule {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    fn api_rules() -> EndpointPatternsConfig {
        config(&[(r"^/api/users/\d+$", "user"), (r"^/api/.*$", "api")])
    }

    #[test]
    fn test_first_match_wins() {
        let matcher = EndpointMatcher::new(&api_rules()).unwrap();
        assert_eq!(&*matcher.match_path("/api/users/42"), "user");
        assert_eq!(&*matcher.match_path("/api/orders"), "api");
    }

    #[test]
    fn test_fallback() {
        let matcher = EndpointMatcher::new(&api_rules()).unwrap();
        assert_eq!(&*matcher.match_path("/health"), "other");
        assert_eq!(matcher.fallback(), FALLBACK_LABEL);
    }

    #[test]
    fn test_fallback_is_cached() {
        let matcher = EndpointMatcher::new(&api_rules()).unwrap();
        assert_eq!(matcher.cache_len(), 0);
        matcher.match_path("/health");
        matcher.match_path("/api/users/1");
        assert_eq!(matcher.cache_len(), 2);
        assert!(matcher.cache.contains("/health"));
    }

    #[test]
    fn test_cache_hit_returns_same_label() {
        let matcher = EndpointMatcher::new(&api_rules()).unwrap();
        let first = matcher.match_path("/api/users/7");
        let second = matcher.match_path("/api/users/7");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_no_normalization() {
        let matcher = EndpointMatcher::new(&api_rules()).unwrap();
        assert_eq!(&*matcher.match_path("/api/users/42/"), "api");
        assert_eq!(&*matcher.match_path("/API/users/42"), "other");
        assert_eq!(&*matcher.match_path("/api/users/%34%32"), "api");
    }

    #[test]
    fn test_disabled_matcher() {
        let mut cfg = api_rules();
        cfg.enabled = false;
        let matcher = EndpointMatcher::new(&cfg).unwrap();

        assert!(!matcher.is_enabled());
        assert_eq!(matcher.rule_count(), 0);
        assert_eq!(&*matcher.match_path("/anything"), "other");
        assert_eq!(&*matcher.match_path("/api/users/42"), "other");
        assert_eq!(matcher.cache_capacity(), 1);
    }

    #[test]
    fn test_disabled_ignores_bad_patterns() {
        let mut cfg = config(&[("(", "broken")]);
        cfg.enabled = false;
        assert!(EndpointMatcher::new(&cfg).is_ok());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let cfg = config(&[(r"^/ok$", "ok"), (r"^/bad/[a-z$", "bad")]);
        let err = EndpointMatcher::new(&cfg).unwrap_err();
        assert!(err.to_string().contains("^/bad/[a-z$"));
    }

    #[test]
    fn test_cache_size_defaults() {
        assert_eq!(effective_cache_size(0), DEFAULT_CACHE_SIZE);
        assert_eq!(effective_cache_size(-5), DEFAULT_CACHE_SIZE);
        assert_eq!(effective_cache_size(32), 32);

        let mut cfg = api_rules();
        cfg.cache_size = 0;
        let matcher = EndpointMatcher::new(&cfg).unwrap();
        assert_eq!(matcher.cache_capacity(), DEFAULT_CACHE_SIZE);
    }

    #[test]
    fn test_eviction_rederives_same_label() {
        let mut cfg = api_rules();
        cfg.cache_size = 1;
        let matcher = EndpointMatcher::new(&cfg).unwrap();

        assert_eq!(&*matcher.match_path("/api/users/1"), "user");
        assert_eq!(&*matcher.match_path("/health"), "other");
        assert_eq!(matcher.cache_len(), 1);
        assert_eq!(&*matcher.match_path("/api/users/1"), "user");
    }

    #[test]
    fn test_large_cache_size_builds() {
        let mut cfg = api_rules();
        cfg.cache_size = 1_000_000_000_000;
        let matcher = EndpointMatcher::new(&cfg).unwrap();

        assert_eq!(matcher.cache_capacity(), 1_000_000_000_000);
        assert_eq!(&*matcher.match_path("/api/users/3"), "user");
        assert_eq!(matcher.cache_len(), 1);
    }
}
