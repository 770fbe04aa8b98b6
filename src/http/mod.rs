//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, gate chain)
//!     → request.rs (request ID)
//!     → security gates (see `security`)
//!     → envelope.rs (JSON envelope on the way out)
//!     → routed handler, or status.rs for unmatched paths
//! ```

pub mod envelope;
pub mod paths;
pub mod request;
pub mod server;
pub mod status;

pub use paths::ApiPaths;
pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
pub use status::{Rendering, StatusPages};
