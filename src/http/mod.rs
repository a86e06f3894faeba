//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → middleware.rs (timing, in-flight gauge)
//!     → upstream.rs (wait for slot, forward, stream response back)
//!     → middleware.rs (classify path, record metrics)
//!     → body.rs (count bytes sent, record response size)
//!     → Send to client
//! ```

pub mod body;
pub mod middleware;
pub mod server;
pub mod upstream;

pub use middleware::{metrics_middleware, MetricsSettings, MetricsState, ProcessingStarted};
pub use server::{HttpServer, ServerError};
pub use upstream::UpstreamState;
