//! Settings file watcher for hot reload.

use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::store::WatchedSettingsStore;

/// Monitors the settings document and refreshes a [`WatchedSettingsStore`].
pub struct SettingsWatcher {
    store: WatchedSettingsStore,
}

impl SettingsWatcher {
    pub fn new(store: WatchedSettingsStore) -> Self {
        Self { store }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for reloads to continue.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let store = self.store.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Settings change detected, reloading");
                        if let Err(e) = store.reload() {
                            tracing::error!(
                                error = %e,
                                "Failed to reload settings, keeping current snapshot"
                            );
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Settings watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(self.store.path(), RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.store.path().display(), "Settings watcher started");
        Ok(watcher)
    }
}
