//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use pt_core::store::DEFAULT_STORAGE_KEY;
use pt_core::{IdleConfig, ManagerConfig};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Absences longer than this are offered for allocation.
    pub idle_threshold_ms: u64,

    /// Timers created when no valid state is stored.
    pub initial_timers: usize,

    /// Key holding the timer snapshot.
    pub storage_key: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("pt.db"),
            idle_threshold_ms: IdleConfig::default().threshold_ms,
            initial_timers: ManagerConfig::default().initial_count,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // PT_DATABASE_PATH, PT_IDLE_THRESHOLD_MS, ...
        figment = figment.merge(Env::prefixed("PT_"));

        figment.extract()
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            initial_count: self.initial_timers,
            storage_key: self.storage_key.clone(),
        }
    }

    pub fn idle_config(&self) -> IdleConfig {
        IdleConfig {
            threshold_ms: self.idle_threshold_ms,
            ..IdleConfig::default()
        }
    }
}

/// Returns the platform-specific config directory for pt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pt"))
}

/// Returns the platform-specific data directory for pt.
///
/// On Linux: `~/.local/share/pt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pt"))
}
