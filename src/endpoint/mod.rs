//! Endpoint classification subsystem.
//!
//! # Data Flow
//! ```text
//! Request path (literal, no normalization)
//!     → cache.rs (recency cache lookup)
//!     → hit: return cached label
//!     → miss: rules.rs (ordered regex evaluation, first match wins)
//!     → store label (or "other") in cache
//!     → Return: low-cardinality endpoint label
//!
//! Rule Compilation (at startup / reload):
//!     EndpointPatternsConfig
//!     → Compile every pattern (all or nothing)
//!     → Freeze as immutable RuleSet
//! ```
//!
//! # Design Decisions
//! - Rules compiled once, immutable at runtime; a reload builds a new matcher
//! - Cache evicts by recency of write; a read hit does not refresh an entry
//! - Unmatched paths are cached too, under the fallback label
//! - Matching never fails; only construction can

pub mod cache;
pub mod matcher;
pub mod rules;

pub use cache::EndpointCache;
pub use matcher::{EndpointMatcher, DEFAULT_CACHE_SIZE, FALLBACK_LABEL};
pub use rules::{MatcherError, Rule, RuleSet};
