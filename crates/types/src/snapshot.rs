//! Per-source metrics snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gpu::GpuReading;
use crate::source::SourceKind;

/// Node synchronisation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Syncing { current: u64, highest: u64 },
}

impl SyncStatus {
    /// Sync progress in percent (100 when synced)
    pub fn progress_percent(&self) -> f64 {
        match *self {
            SyncStatus::Synced => 100.0,
            SyncStatus::Syncing { current, highest } => {
                if highest == 0 {
                    0.0
                } else {
                    (current as f64 / highest as f64 * 100.0).clamp(0.0, 100.0)
                }
            }
        }
    }
}

/// How a snapshot was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Read from the source's own API
    #[default]
    Direct,
    /// The source's API was unusable and the values were derived from node RPC
    RpcFallback,
}

/// One source's most recent metrics read
///
/// Every metric is optional. `None` means the source did not report it and
/// must never be read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub source: SourceKind,
    #[serde(default)]
    pub origin: SnapshotOrigin,
    pub captured_at: DateTime<Utc>,
    pub block_height: Option<u64>,
    pub difficulty: Option<f64>,
    /// Seconds between blocks
    pub block_time: Option<f64>,
    /// Hashes per second across the network
    pub network_hash_rate: Option<f64>,
    pub peer_count: Option<u64>,
    pub sync_status: Option<SyncStatus>,
    /// Wei
    pub gas_price: Option<u64>,
    pub pending_tx_count: Option<u64>,
    /// Hashes per second produced by this rig
    pub local_hash_rate: Option<f64>,
    /// Watts drawn by this rig
    pub power_usage: Option<f64>,
    /// Cumulative accepted share counter
    pub accepted_shares: Option<u64>,
    /// Cumulative rejected share counter
    pub rejected_shares: Option<u64>,
    pub mining: Option<bool>,
    #[serde(default)]
    pub gpus: Vec<GpuReading>,
}

impl MetricsSnapshot {
    /// Create an empty snapshot (every metric unknown)
    pub fn new(source: SourceKind, captured_at: DateTime<Utc>) -> Self {
        Self {
            source,
            origin: SnapshotOrigin::Direct,
            captured_at,
            block_height: None,
            difficulty: None,
            block_time: None,
            network_hash_rate: None,
            peer_count: None,
            sync_status: None,
            gas_price: None,
            pending_tx_count: None,
            local_hash_rate: None,
            power_usage: None,
            accepted_shares: None,
            rejected_shares: None,
            mining: None,
            gpus: Vec::new(),
        }
    }

    /// Precedence used when resolving conflicts
    ///
    /// A snapshot derived from RPC ranks as RPC data regardless of which
    /// poller produced it.
    pub fn effective_precedence(&self) -> u8 {
        self.effective_kind().precedence()
    }

    /// The source this snapshot's data actually came from
    pub fn effective_kind(&self) -> SourceKind {
        match self.origin {
            SnapshotOrigin::Direct => self.source,
            SnapshotOrigin::RpcFallback => SourceKind::Node,
        }
    }

    /// True when no metric at all is known
    pub fn is_empty(&self) -> bool {
        MetricField::ALL.iter().all(|field| field.read(self).is_none())
            && self.sync_status.is_none()
            && self.mining.is_none()
            && self.gpus.is_empty()
    }

    /// Set a numeric metric from a raw reading
    ///
    /// Non-finite or negative values leave the field unknown.
    pub fn set(&mut self, field: MetricField, value: f64) {
        if !value.is_finite() || value < 0.0 {
            return;
        }
        let as_count = value.round() as u64;
        match field {
            MetricField::BlockHeight => self.block_height = Some(as_count),
            MetricField::Difficulty => self.difficulty = Some(value),
            MetricField::BlockTime => self.block_time = Some(value),
            MetricField::NetworkHashRate => self.network_hash_rate = Some(value),
            MetricField::PeerCount => self.peer_count = Some(as_count),
            MetricField::GasPrice => self.gas_price = Some(as_count),
            MetricField::PendingTxCount => self.pending_tx_count = Some(as_count),
            MetricField::LocalHashRate => self.local_hash_rate = Some(value),
            MetricField::PowerUsage => self.power_usage = Some(value),
            MetricField::AcceptedShares => self.accepted_shares = Some(as_count),
            MetricField::RejectedShares => self.rejected_shares = Some(as_count),
        }
    }
}

/// Numeric metrics a snapshot can carry
///
/// Used to map Prometheus queries onto snapshot fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    BlockHeight,
    Difficulty,
    BlockTime,
    NetworkHashRate,
    PeerCount,
    GasPrice,
    PendingTxCount,
    LocalHashRate,
    PowerUsage,
    AcceptedShares,
    RejectedShares,
}

impl MetricField {
    pub const ALL: [MetricField; 11] = [
        MetricField::BlockHeight,
        MetricField::Difficulty,
        MetricField::BlockTime,
        MetricField::NetworkHashRate,
        MetricField::PeerCount,
        MetricField::GasPrice,
        MetricField::PendingTxCount,
        MetricField::LocalHashRate,
        MetricField::PowerUsage,
        MetricField::AcceptedShares,
        MetricField::RejectedShares,
    ];

    /// Read this field from a snapshot as a float
    pub fn read(self, snapshot: &MetricsSnapshot) -> Option<f64> {
        match self {
            MetricField::BlockHeight => snapshot.block_height.map(|v| v as f64),
            MetricField::Difficulty => snapshot.difficulty,
            MetricField::BlockTime => snapshot.block_time,
            MetricField::NetworkHashRate => snapshot.network_hash_rate,
            MetricField::PeerCount => snapshot.peer_count.map(|v| v as f64),
            MetricField::GasPrice => snapshot.gas_price.map(|v| v as f64),
            MetricField::PendingTxCount => snapshot.pending_tx_count.map(|v| v as f64),
            MetricField::LocalHashRate => snapshot.local_hash_rate,
            MetricField::PowerUsage => snapshot.power_usage,
            MetricField::AcceptedShares => snapshot.accepted_shares.map(|v| v as f64),
            MetricField::RejectedShares => snapshot.rejected_shares.map(|v| v as f64),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricField::BlockHeight => "block_height",
            MetricField::Difficulty => "difficulty",
            MetricField::BlockTime => "block_time",
            MetricField::NetworkHashRate => "network_hash_rate",
            MetricField::PeerCount => "peer_count",
            MetricField::GasPrice => "gas_price",
            MetricField::PendingTxCount => "pending_tx_count",
            MetricField::LocalHashRate => "local_hash_rate",
            MetricField::PowerUsage => "power_usage",
            MetricField::AcceptedShares => "accepted_shares",
            MetricField::RejectedShares => "rejected_shares",
        }
    }
}
