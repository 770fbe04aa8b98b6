//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     handlers::builtin_registry()
//!     → registry.rs (mount each module on a fresh router)
//!     → merge successful modules, log and skip failed ones
//!     → MountReport { router, mounted, failed }
//!
//! Request:
//!     gate chain → merged axum Router → handler (or 404 fallback)
//! ```
//!
//! # Design Decisions
//! - Modules are registered explicitly; nothing is discovered on disk
//! - Routes are fixed once the server starts
//! - One bad module never aborts startup

pub mod registry;

pub use registry::{MountError, MountReport, RouteModule, RouteRegistry};
