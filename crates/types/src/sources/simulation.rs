//! Simulated-data generator configuration.

use serde::{Deserialize, Serialize};

use crate::gpu::GpuConfig;

fn default_enabled() -> bool {
    true
}

fn default_update_interval() -> u64 {
    2000
}

fn default_freshness_window() -> u64 {
    10_000
}

fn default_gpus() -> Vec<GpuConfig> {
    vec![
        GpuConfig::new("RTX 3080"),
        GpuConfig {
            name: "RX 6800 XT".to_string(),
            target_temp: 62.0,
            max_temp: 90.0,
            base_hash_rate: 27_000_000.0,
            base_power: 140.0,
        },
    ]
}

fn default_share_difficulty() -> f64 {
    4_000_000_000.0
}

fn default_reject_ratio() -> f64 {
    0.01
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Allow the generator to run while no external source is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
    #[serde(default = "default_freshness_window")]
    pub freshness_window_ms: u64,
    #[serde(default = "default_gpus")]
    pub gpus: Vec<GpuConfig>,
    /// Hashes per share, drives the simulated share counter
    #[serde(default = "default_share_difficulty")]
    pub share_difficulty: f64,
    /// Fraction of simulated shares that are rejected
    #[serde(default = "default_reject_ratio")]
    pub reject_ratio: f64,
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            update_interval_ms: default_update_interval(),
            freshness_window_ms: default_freshness_window(),
            gpus: default_gpus(),
            share_difficulty: default_share_difficulty(),
            reject_ratio: default_reject_ratio(),
            seed: None,
        }
    }
}
