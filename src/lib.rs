//! HTTP request metrics with bounded-cardinality endpoint labels.

pub mod config;
pub mod endpoint;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServerConfig;
pub use endpoint::EndpointMatcher;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
