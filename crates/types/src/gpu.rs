//! GPU records: static configuration and live readings.

use serde::{Deserialize, Serialize};

fn default_target_temp() -> f64 {
    65.0
}

fn default_max_temp() -> f64 {
    85.0
}

fn default_base_hash_rate() -> f64 {
    30_000_000.0
}

fn default_base_power() -> f64 {
    150.0
}

/// Static GPU description, owned by configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuConfig {
    pub name: String,
    /// Temperature the card settles around, in °C
    #[serde(default = "default_target_temp")]
    pub target_temp: f64,
    /// Temperature the card never exceeds, in °C
    #[serde(default = "default_max_temp")]
    pub max_temp: f64,
    /// Nominal hash rate in H/s
    #[serde(default = "default_base_hash_rate")]
    pub base_hash_rate: f64,
    /// Nominal board power in watts
    #[serde(default = "default_base_power")]
    pub base_power: f64,
}

impl GpuConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_temp: default_target_temp(),
            max_temp: default_max_temp(),
            base_hash_rate: default_base_hash_rate(),
            base_power: default_base_power(),
        }
    }
}

/// Live GPU values, written only by the simulation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuReading {
    pub name: String,
    /// H/s
    pub hash_rate: f64,
    /// °C
    pub temperature: f64,
    /// Percent
    pub fan_speed: f64,
    /// Watts
    pub power: f64,
    /// °C
    pub memory_temp: f64,
}

impl GpuReading {
    /// Reading sitting exactly on the configured targets
    pub fn at_target(config: &GpuConfig) -> Self {
        Self {
            name: config.name.clone(),
            hash_rate: config.base_hash_rate,
            temperature: config.target_temp,
            fan_speed: 50.0,
            power: config.base_power,
            memory_temp: config.target_temp + 10.0,
        }
    }
}
