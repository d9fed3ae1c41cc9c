//! Application configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use quai_dash_types::{Preferences, SourcesConfig};

use super::store::JsonStore;

/// Current config format version
pub const CONFIG_VERSION: u32 = 1;

const CONFIG_FILE: &str = "config.json";
const PREFERENCES_FILE: &str = "preferences.json";

/// Directory holding every quai-dash file
pub fn config_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("network", "quai", "quai-dash")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dirs.config_dir().to_path_buf())
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_block_reward() -> f64 {
    2.0
}

fn default_history_length() -> usize {
    300
}

/// Reconcile loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// How often the view is rebuilt
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// QUAI paid per block, used for reward accrual
    #[serde(default = "default_block_reward")]
    pub block_reward: f64,
    /// History points kept for charts and export
    #[serde(default = "default_history_length")]
    pub history_length: usize,
}

impl ReconcileConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            block_reward: default_block_reward(),
            history_length: default_history_length(),
        }
    }
}

/// Application-wide configuration
///
/// Preferences are kept in their own flat file next to the config and are
/// not part of the config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the config format
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Wallet address looked up at startup
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(skip)]
    pub preferences: Preferences,
}

impl AppConfig {
    /// Load configuration from disk, defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir()?)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&config_dir()?.join(CONFIG_FILE))
    }

    fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            let mut config = Self::default();
            config.preferences = Self::preferences_store(&config_path).load();
            return Ok(config);
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific file path
    ///
    /// Preferences are read from `preferences.json` in the same directory.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.preferences = Self::preferences_store(path).load();
        Ok(config)
    }

    /// Save configuration (and preferences) to a specific file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Self::preferences_store(path).save(&self.preferences)
    }

    /// Store for the preferences file belonging to a config file
    pub fn preferences_store(config_path: &Path) -> JsonStore<Preferences> {
        let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        JsonStore::new(dir.join(PREFERENCES_FILE))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sources: SourcesConfig::default(),
            reconcile: ReconcileConfig::default(),
            wallet_address: None,
            preferences: Preferences::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_round_trip_keeps_preferences_separate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.sources.prometheus.enabled = true;
        config.reconcile.block_reward = 1.5;
        config.preferences.temperature_threshold = 72.0;
        config.save_to_path(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("temperature_threshold"));

        let loaded = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sources": {"node": {"rpc_url": "http://10.0.0.2:9001"}}}"#)
            .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.sources.node.rpc_url, "http://10.0.0.2:9001");
        assert!(config.sources.node.enabled);
        assert_eq!(config.reconcile, ReconcileConfig::default());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load_from_path(&path).is_err());
    }
}
