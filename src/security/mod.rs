//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (security headers on every response)
//!     → rate_limit.rs (anonymous per-IP window)
//!     → maintenance.rs (503 unless exempt)
//!     → blocking.rs (403 for internal paths)
//!     → Pass to routing
//!         → access_control.rs (API key + per-key window, per route)
//! ```
//!
//! # Design Decisions
//! - Each gate reads a fresh settings snapshot
//! - Maintenance fails open, key validation fails closed
//! - Rate-limit state is owned by the limiter types, never shared raw

pub mod access_control;
pub mod blocking;
pub mod client_ip;
pub mod headers;
pub mod maintenance;
pub mod rate_limit;

pub use access_control::{AccessDecision, AccessGate, Denial, KeyGuard, RouteAccess};
pub use rate_limit::{AnonymousLimiter, ApiKeyLimiter, KeyPolicy, RateLimitPolicy};
