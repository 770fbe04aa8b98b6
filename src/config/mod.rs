//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (static, read once)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! settings.json (externally owned, hot)
//!     → store.rs (fresh read per evaluation, or cached snapshot)
//!     → watcher.rs (file change → snapshot swap, watch mode only)
//!     → gates read a Settings snapshot per request
//! ```
//!
//! # Design Decisions
//! - Static config is immutable once loaded
//! - All static fields have defaults to allow minimal configs
//! - The settings document is never cached in fresh mode

pub mod loader;
pub mod schema;
pub mod settings;
pub mod store;
pub mod validation;
pub mod watcher;

use std::sync::Arc;

use notify::RecommendedWatcher;

pub use schema::GatewayConfig;
pub use schema::{RateLimitConfig, SettingsMode, SettingsSourceConfig};
pub use settings::{ApiKeyEntry, Settings};
pub use store::{
    FileSettingsStore, MemorySettingsStore, SettingsError, SettingsStore, SharedSettingsStore,
    WatchedSettingsStore,
};

/// Build the settings store selected by `config.mode`.
///
/// In watch mode the returned watcher must outlive the server.
pub fn open_settings_store(
    config: &SettingsSourceConfig,
) -> Result<(SharedSettingsStore, Option<RecommendedWatcher>), notify::Error> {
    match config.mode {
        SettingsMode::Fresh => Ok((Arc::new(FileSettingsStore::new(&config.path)), None)),
        SettingsMode::Watch => {
            let store = WatchedSettingsStore::open(&config.path);
            let watcher = watcher::SettingsWatcher::new(store.clone()).run()?;
            Ok((Arc::new(store), Some(watcher)))
        }
    }
}
