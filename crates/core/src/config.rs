//! Application configuration.
//!
//! Values are layered with the `config` crate: built-in defaults, then the
//! optional `<config dir>/gamevault/config.json`, then `GAMEVAULT__*`
//! environment variables (`GAMEVAULT__AUTOSAVE__DEBOUNCE_MS=500`).

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{autosave::AutosaveConfig, search::SearchConfig, storage::StorageKeys};

const APP_DIR: &str = "gamevault";
const CONFIG_FILE: &str = "config.json";
const ENV_PREFIX: &str = "GAMEVAULT";

/// Autosave timings in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSettings {
    /// Quiet period before a debounced write.
    pub debounce_ms: u64,
    /// Background flush period.
    pub interval_ms: u64,
    /// How long the saved/error status stays up.
    pub saved_display_ms: u64,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        let defaults = AutosaveConfig::default();
        Self {
            debounce_ms: millis(defaults.debounce),
            interval_ms: millis(defaults.interval),
            saved_display_ms: millis(defaults.saved_display),
        }
    }
}

/// Search tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Quiet period before a typed query is committed.
    pub debounce_ms: u64,
    /// Persisted history length.
    pub history_limit: usize,
    /// History entries offered for short queries.
    pub recent_display: usize,
    /// Cap on collection suggestions.
    pub max_suggestions: usize,
    /// Idle time after which a committed query is remembered.
    pub history_idle_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let defaults = SearchConfig::default();
        Self {
            debounce_ms: millis(defaults.debounce),
            history_limit: defaults.history_limit,
            recent_display: defaults.recent_display,
            max_suggestions: defaults.max_suggestions,
            history_idle_ms: millis(defaults.history_idle),
        }
    }
}

/// User-facing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the stored collection and history.
    pub data_dir: PathBuf,
    /// Storage keys.
    pub storage: StorageKeys,
    /// Autosave timings.
    pub autosave: AutosaveSettings,
    /// Search tuning.
    pub search: SearchSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage: StorageKeys::default(),
            autosave: AutosaveSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

/// Typed settings consumed by the core components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Autosave engine settings.
    pub autosave: AutosaveConfig,
    /// Search index settings.
    pub search: SearchConfig,
}

impl AppConfig {
    /// Load from the default config file location and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path().as_deref())
    }

    /// Load with `path` as the optional file layer.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("failed to encode default configuration")?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Convert millisecond settings into the engines' typed configuration.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            autosave: AutosaveConfig {
                debounce: Duration::from_millis(self.autosave.debounce_ms),
                interval: Duration::from_millis(self.autosave.interval_ms),
                saved_display: Duration::from_millis(self.autosave.saved_display_ms),
            },
            search: SearchConfig {
                debounce: Duration::from_millis(self.search.debounce_ms),
                history_limit: self.search.history_limit,
                recent_display: self.search.recent_display,
                max_suggestions: self.search.max_suggestions,
                history_idle: Duration::from_millis(self.search.history_idle_ms),
            },
        }
    }
}

/// Location of the config file, if the platform has a config directory.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Write the default configuration if no config file exists yet.
pub fn ensure_default_config() -> Result<()> {
    match config_path() {
        Some(path) => write_default_config(&path),
        None => Ok(()),
    }
}

/// Write the default configuration to `path` unless something is already there.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(&AppConfig::default())?;
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
