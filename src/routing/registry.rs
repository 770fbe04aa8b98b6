//! Route registry.
//!
//! # Responsibilities
//! - Hold the closed list of route modules, grouped by category
//! - Mount each module onto its own router and merge the result
//! - Count successful mounts for the startup summary
//!
//! # Design Decisions
//! - A module that errors or panics is logged and skipped; startup continues
//! - A failed module leaves no partial routes behind
//! - Mount order is not significant; modules own disjoint paths

use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::Router;
use thiserror::Error;

use crate::http::server::AppState;
use crate::observability::metrics;

/// Why a module could not be mounted.
#[derive(Debug, Error)]
pub enum MountError {
    /// The module cannot be built (missing upstream, bad config).
    #[error("module unavailable: {0}")]
    Unavailable(String),
    /// A route could not be registered.
    #[error("invalid route: {0}")]
    Route(String),
    /// The module panicked while mounting or merging.
    #[error("module panicked: {0}")]
    Panicked(String),
}

/// A pluggable set of handlers.
pub trait RouteModule: Send + Sync {
    fn name(&self) -> &str;

    /// Register zero or more routes on `router` and return it.
    fn mount(&self, router: Router<AppState>, state: &AppState)
        -> Result<Router<AppState>, MountError>;
}

struct ModuleEntry {
    category: &'static str,
    module: Box<dyn RouteModule>,
}

/// Outcome of [`RouteRegistry::discover`].
pub struct MountReport {
    pub router: Router<AppState>,
    pub mounted: Vec<String>,
    pub failed: Vec<(String, MountError)>,
}

impl MountReport {
    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }
}

#[derive(Default)]
pub struct RouteRegistry {
    entries: Vec<ModuleEntry>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, category: &'static str, module: impl RouteModule + 'static) -> Self {
        self.entries.push(ModuleEntry {
            category,
            module: Box::new(module),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mount every registered module. Never fails as a whole.
    pub fn discover(&self, state: &AppState) -> MountReport {
        let mut router = Router::new();
        let mut mounted = Vec::new();
        let mut failed = Vec::new();

        for entry in &self.entries {
            let label = format!("{}/{}", entry.category, entry.module.name());
            match mount_one(entry.module.as_ref(), router.clone(), state) {
                Ok(merged) => {
                    router = merged;
                    tracing::info!(module = %label, "Loaded route module");
                    mounted.push(label);
                }
                Err(e) => {
                    tracing::error!(module = %label, error = %e, "Error loading route module");
                    failed.push((label, e));
                }
            }
        }

        metrics::record_routes_mounted(mounted.len());
        tracing::info!(
            total = mounted.len(),
            failed = failed.len(),
            "Route registry loaded"
        );

        MountReport {
            router,
            mounted,
            failed,
        }
    }
}

fn mount_one(
    module: &dyn RouteModule,
    base: Router<AppState>,
    state: &AppState,
) -> Result<Router<AppState>, MountError> {
    let own = catch_unwind(AssertUnwindSafe(|| module.mount(Router::new(), state)))
        .map_err(|p| MountError::Panicked(panic_message(p)))??;

    // Overlapping routes make merge panic.
    catch_unwind(AssertUnwindSafe(|| base.merge(own)))
        .map_err(|p| MountError::Panicked(panic_message(p)))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
