//! The reconciled view-model consumed by presentation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::gpu::GpuReading;
use crate::snapshot::SyncStatus;
use crate::source::{SourceKind, SourceStatus};

/// A metric value together with where and when it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reading<T> {
    /// No fresh source reported this metric
    #[default]
    Unknown,
    Known {
        value: T,
        source: SourceKind,
        captured_at: DateTime<Utc>,
    },
}

impl<T> Reading<T> {
    pub fn known(value: T, source: SourceKind, captured_at: DateTime<Utc>) -> Self {
        Reading::Known {
            value,
            source,
            captured_at,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Known { value, .. } => Some(value),
            Reading::Unknown => None,
        }
    }

    pub fn source(&self) -> Option<SourceKind> {
        match self {
            Reading::Known { source, .. } => Some(*source),
            Reading::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Reading::Known { .. })
    }
}

impl<T: Copy> Reading<T> {
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }
}

impl<T: Display> Reading<T> {
    /// Render the value, or the placeholder when unknown
    pub fn display_or(&self, placeholder: &str) -> String {
        match self {
            Reading::Known { value, .. } => value.to_string(),
            Reading::Unknown => placeholder.to_string(),
        }
    }
}

/// Freshness report for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub kind: SourceKind,
    pub status: SourceStatus,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Quantities computed from reconciled metrics and mining state
///
/// `None` means undefined (missing inputs or division by zero), never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DerivedMetrics {
    /// Expected seconds until this rig finds a block
    pub time_to_block: Option<f64>,
    /// Chance of finding a block within one reconcile tick
    pub block_probability: Option<f64>,
    /// H/s per kW
    pub efficiency: Option<f64>,
    /// Accepted shares per minute over the last 60 seconds
    pub share_rate: Option<f64>,
    pub average_hash_rate: Option<f64>,
    pub average_power: Option<f64>,
    pub average_temperature: Option<f64>,
}

/// Running mining totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MiningSummary {
    pub accepted_shares: u64,
    pub rejected_shares: u64,
    /// Rewards accrued since tracking began, in QUAI
    pub rewards_accrued: f64,
    pub uptime_secs: u64,
}

/// Single merged structure consumed by presentation
///
/// Every field is always present; unknown metrics must be rendered as
/// placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledView {
    pub generated_at: DateTime<Utc>,
    pub block_height: Reading<u64>,
    pub difficulty: Reading<f64>,
    pub block_time: Reading<f64>,
    pub network_hash_rate: Reading<f64>,
    pub peer_count: Reading<u64>,
    pub sync_status: Reading<SyncStatus>,
    pub gas_price: Reading<u64>,
    pub pending_tx_count: Reading<u64>,
    pub local_hash_rate: Reading<f64>,
    pub power_usage: Reading<f64>,
    /// Cumulative counters as reported by the winning source
    pub accepted_shares: Reading<u64>,
    pub rejected_shares: Reading<u64>,
    pub mining: Reading<bool>,
    pub gpus: Reading<Vec<GpuReading>>,
    pub derived: DerivedMetrics,
    pub totals: MiningSummary,
    pub sources: Vec<SourceReport>,
}

impl ReconciledView {
    /// View with every metric unknown
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            block_height: Reading::Unknown,
            difficulty: Reading::Unknown,
            block_time: Reading::Unknown,
            network_hash_rate: Reading::Unknown,
            peer_count: Reading::Unknown,
            sync_status: Reading::Unknown,
            gas_price: Reading::Unknown,
            pending_tx_count: Reading::Unknown,
            local_hash_rate: Reading::Unknown,
            power_usage: Reading::Unknown,
            accepted_shares: Reading::Unknown,
            rejected_shares: Reading::Unknown,
            mining: Reading::Unknown,
            gpus: Reading::Unknown,
            derived: DerivedMetrics::default(),
            totals: MiningSummary::default(),
            sources: Vec::new(),
        }
    }

    pub fn source_report(&self, kind: SourceKind) -> Option<&SourceReport> {
        self.sources.iter().find(|report| report.kind == kind)
    }

    /// Hottest GPU temperature, if GPU readings are known
    pub fn max_gpu_temperature(&self) -> Option<f64> {
        self.gpus
            .value()
            .and_then(|gpus| gpus.iter().map(|gpu| gpu.temperature).reduce(f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_renders_placeholder() {
        let reading: Reading<u64> = Reading::Unknown;
        assert_eq!(reading.display_or("--"), "--");
        assert_eq!(reading.get(), None);

        let reading = Reading::known(42u64, SourceKind::Node, Utc::now());
        assert_eq!(reading.display_or("--"), "42");
        assert_eq!(reading.source(), Some(SourceKind::Node));
    }

    #[test]
    fn test_empty_view_serializes_unknowns() {
        let view = ReconciledView::empty(Utc::now());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["block_height"], "unknown");
        assert!(json["derived"]["efficiency"].is_null());
    }
}
