//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gates and handlers produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached by the HTTP layer and shows up in trace spans
//! - Metric calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
