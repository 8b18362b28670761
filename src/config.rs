//! # Executor configuration and persisted settings.
//!
//! [`Config`] centralizes runtime tuning for the executor: worker pool
//! size, idle debounce window, and event bus capacity.
//!
//! [`Settings`] is the small user-facing subset that survives restarts,
//! stored as JSON under the platform config directory (override with the
//! `TASKHIVE_SETTINGS` environment variable).

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default worker pool size.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default idle debounce window.
pub const DEFAULT_IDLE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Runtime configuration for the executor.
///
/// ## Field semantics
/// - `max_workers`: concurrent worker budget; a dispatched group holds a
///   slot while it waits for members, so one extra slot is granted to keep
///   a waiting group from starving its own members.
/// - `idle_debounce`: how long the system must stay quiescent before
///   `SystemIdle` is published. Any new activity cancels the pending
///   notification.
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by the bus).
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of concurrently running workers.
    pub max_workers: usize,

    /// Quiescence window before a `SystemIdle` event is published.
    pub idle_debounce: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// will receive `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Applies persisted [`Settings`] on top of the defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_workers: settings.max_workers.max(1),
            ..Self::default()
        }
    }

    /// Worker budget clamped to a minimum of one.
    #[inline]
    pub fn max_workers_clamped(&self) -> usize {
        self.max_workers.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_workers = 4`
    /// - `idle_debounce = 1000ms`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            idle_debounce: DEFAULT_IDLE_DEBOUNCE,
            bus_capacity: 1024,
        }
    }
}

/// User preferences persisted across runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Preferred worker pool size.
    pub max_workers: usize,
    /// Enables verbose debug surfaces in embedding applications.
    pub enable_debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            enable_debug: false,
        }
    }
}

impl Settings {
    /// Resolves the settings file location.
    ///
    /// `TASKHIVE_SETTINGS` wins when set; otherwise the platform config
    /// directory is used (`.../taskhive/settings.json`).
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TASKHIVE_SETTINGS") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join("taskhive").join("settings.json"))
    }

    /// Loads settings from `path`, or defaults when the file is missing.
    pub fn load(path: &Path) -> io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Saves settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }
}
