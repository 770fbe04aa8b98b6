//! HTTP API gateway library.
//!
//! Request admission pipeline (security headers, anonymous rate limiting,
//! maintenance, path blocking, response envelope) in front of a registry
//! of pluggable route modules with per-key access control.

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{RouteModule, RouteRegistry};
