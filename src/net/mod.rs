//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.listener
//!     → listener.rs (bind, walk to next port if busy)
//!     → Hand off to HTTP layer
//! ```

pub mod listener;

pub use listener::{bind, ListenerError};
