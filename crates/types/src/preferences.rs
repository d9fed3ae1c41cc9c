//! User preferences stored as a flat key-value document

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_temperature_threshold() -> f64 {
    80.0
}

fn default_display_currency() -> String {
    "USD".to_string()
}

/// Flat preference record, read and written as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// Keep mining totals across restarts
    #[serde(default = "default_true")]
    pub persistence_enabled: bool,
    /// Export stats on shutdown
    #[serde(default)]
    pub auto_export_enabled: bool,
    /// GPU temperature alert threshold in °C
    #[serde(default = "default_temperature_threshold")]
    pub temperature_threshold: f64,
    #[serde(default = "default_display_currency")]
    pub display_currency: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            persistence_enabled: true,
            auto_export_enabled: false,
            temperature_threshold: default_temperature_threshold(),
            display_currency: default_display_currency(),
        }
    }
}
