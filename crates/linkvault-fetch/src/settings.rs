//! Fetch-layer settings.
//!
//! Environment-variable driven (`LINKVAULT_*` prefixed), with sensible
//! defaults for a local deployment.

use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Where the per-domain override config file lives by default.
const DEFAULT_OVERRIDES_PATH: &str = "website_overrides.json";

/// Where snapshots are written by default.
const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

/// Runtime settings for the fetch layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Path of the per-domain override config file
    /// (`LINKVAULT_OVERRIDES_PATH`).
    pub overrides_path: PathBuf,
    /// Directory snapshots are written into (`LINKVAULT_SNAPSHOT_DIR`).
    pub snapshot_dir: PathBuf,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            overrides_path: PathBuf::from(DEFAULT_OVERRIDES_PATH),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
        }
    }
}

impl FetchSettings {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let settings = Self::from_lookup(|key| env::var(key).ok());
        debug!(
            overrides_path = %settings.overrides_path.display(),
            snapshot_dir = %settings.snapshot_dir.display(),
            "loaded fetch settings"
        );
        settings
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            overrides_path: lookup("LINKVAULT_OVERRIDES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.overrides_path),
            snapshot_dir: lookup("LINKVAULT_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
        }
    }
}
