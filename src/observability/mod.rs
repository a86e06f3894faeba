//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Request metrics middleware additionally uses:
//!     → errors.rs (status code → error type)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Metrics go through the `metrics` facade; the exporter is installed once
//! - Every per-request label set is bounded: method, endpoint label, status

pub mod errors;
pub mod logging;
pub mod metrics;

pub use errors::{classify_error, is_error_status, ErrorType, NO_WORKERS_HEADER};
