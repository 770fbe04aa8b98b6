//! Concrete route modules.
//!
//! # Data Flow
//! ```text
//! builtin_registry()
//!     → system   (settings, notifications, health; open)
//!     → ai       (luminai chat proxy; key-gated)
//!     → maker    (brat image/video proxy; key-gated)
//!     → RouteRegistry::discover (routing/registry.rs)
//! ```

pub mod brat;
pub mod luminai;
pub mod system;

pub use brat::BratModule;
pub use luminai::LuminaiModule;
pub use system::SystemModule;

use crate::routing::RouteRegistry;

/// The closed list of modules served by the gateway binary.
pub fn builtin_registry() -> RouteRegistry {
    RouteRegistry::new()
        .register("system", SystemModule)
        .register("ai", LuminaiModule)
        .register("maker", BratModule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lists_every_module() {
        assert_eq!(builtin_registry().len(), 3);
    }
}
