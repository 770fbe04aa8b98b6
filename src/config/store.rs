//! Settings stores.
//!
//! Every gate asks its store for a snapshot on every evaluation. The file
//! store re-reads the document each time; the watched store serves a cached
//! snapshot that a file watcher replaces when the document changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use thiserror::Error;

use crate::config::settings::Settings;

/// Error type for settings reads.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings are not loaded")]
    Unavailable,
}

/// Source of the current settings snapshot.
pub trait SettingsStore: Send + Sync + 'static {
    fn load(&self) -> Result<Arc<Settings>, SettingsError>;
}

pub type SharedSettingsStore = Arc<dyn SettingsStore>;

/// Reads and parses the document on every call.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Arc<Settings>, SettingsError> {
        read_settings(&self.path).map(Arc::new)
    }
}

pub(crate) fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path)?;
    Ok(Settings::from_json(&raw)?)
}

/// Serves a cached snapshot kept current by a [`SettingsWatcher`].
///
/// [`SettingsWatcher`]: crate::config::watcher::SettingsWatcher
#[derive(Clone)]
pub struct WatchedSettingsStore {
    path: PathBuf,
    current: Arc<ArcSwapOption<Settings>>,
}

impl WatchedSettingsStore {
    /// Load the initial snapshot. A failed first read leaves the store empty
    /// until the watcher picks up a valid document.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = match read_settings(&path) {
            Ok(settings) => Some(Arc::new(settings)),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Initial settings load failed");
                None
            }
        };
        Self {
            path,
            current: Arc::new(ArcSwapOption::new(initial)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the document. On failure the previous snapshot is kept.
    pub fn reload(&self) -> Result<(), SettingsError> {
        let settings = read_settings(&self.path)?;
        self.current.store(Some(Arc::new(settings)));
        Ok(())
    }
}

impl SettingsStore for WatchedSettingsStore {
    fn load(&self) -> Result<Arc<Settings>, SettingsError> {
        self.current.load_full().ok_or(SettingsError::Unavailable)
    }
}

/// In-memory snapshot, replaceable at runtime.
#[derive(Default)]
pub struct MemorySettingsStore {
    current: ArcSwapOption<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: ArcSwapOption::new(Some(Arc::new(settings))),
        }
    }

    /// A store whose reads always fail.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn replace(&self, settings: Settings) {
        self.current.store(Some(Arc::new(settings)));
    }

    pub fn clear(&self) {
        self.current.store(None);
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Arc<Settings>, SettingsError> {
        self.current.load_full().ok_or(SettingsError::Unavailable)
    }
}
