//! Source configuration types for all pollers.

pub mod explorer;
pub mod node;
pub mod prometheus;
pub mod simulation;

pub use explorer::{ExplorerEndpoint, ExplorerEndpointKind, ExplorerSourceConfig};
pub use node::NodeSourceConfig;
pub use prometheus::PrometheusSourceConfig;
pub use simulation::SimulationConfig;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::source::SourceKind;

/// Configuration of every source, read by pollers at the start of each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub node: NodeSourceConfig,
    #[serde(default)]
    pub prometheus: PrometheusSourceConfig,
    #[serde(default)]
    pub explorer: ExplorerSourceConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl SourcesConfig {
    /// True when at least one real data source is switched on
    pub fn any_external_enabled(&self) -> bool {
        self.node.enabled || self.prometheus.enabled || self.explorer.enabled
    }

    /// Whether the given source should be polled at all
    ///
    /// The simulated source only runs while every external source is off.
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Node => self.node.enabled,
            SourceKind::Prometheus => self.prometheus.enabled,
            SourceKind::Explorer => self.explorer.enabled,
            SourceKind::Simulated => self.simulation.enabled && !self.any_external_enabled(),
        }
    }

    pub fn update_interval(&self, kind: SourceKind) -> Duration {
        let ms = match kind {
            SourceKind::Node => self.node.update_interval_ms,
            SourceKind::Prometheus => self.prometheus.update_interval_ms,
            SourceKind::Explorer => self.explorer.update_interval_ms,
            SourceKind::Simulated => self.simulation.update_interval_ms,
        };
        Duration::from_millis(ms.max(1))
    }

    /// Maximum age before a source's snapshot is treated as unknown
    pub fn freshness_window(&self, kind: SourceKind) -> Duration {
        let ms = match kind {
            SourceKind::Node => self.node.freshness_window_ms,
            SourceKind::Prometheus => self.prometheus.freshness_window_ms,
            SourceKind::Explorer => self.explorer.freshness_window_ms,
            SourceKind::Simulated => self.simulation.freshness_window_ms,
        };
        Duration::from_millis(ms)
    }
}
