//! Source identity, precedence and status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the data sources feeding the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Block explorer API (REST or GraphQL)
    Explorer,
    /// Prometheus HTTP query API
    Prometheus,
    /// Node JSON-RPC endpoint
    Node,
    /// Locally generated fallback data
    Simulated,
}

impl SourceKind {
    /// All sources, highest precedence first
    pub const BY_PRECEDENCE: [SourceKind; 4] = [
        SourceKind::Explorer,
        SourceKind::Prometheus,
        SourceKind::Node,
        SourceKind::Simulated,
    ];

    /// Precedence rank, higher wins when two sources report the same metric
    pub fn precedence(self) -> u8 {
        match self {
            SourceKind::Explorer => 3,
            SourceKind::Prometheus => 2,
            SourceKind::Node => 1,
            SourceKind::Simulated => 0,
        }
    }

    /// Whether this source talks to something outside the process
    pub fn is_external(self) -> bool {
        !matches!(self, SourceKind::Simulated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Explorer => "explorer",
            SourceKind::Prometheus => "prometheus",
            SourceKind::Node => "node",
            SourceKind::Simulated => "simulated",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection indicator shown per source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Source is disabled or has no usable endpoint
    #[default]
    NotConfigured,
    /// Configured but no successful poll yet, or failing with nothing fresh to show
    Offline,
    /// Last snapshot is within the freshness window
    Connected,
    /// Last snapshot is older than the freshness window
    Stale,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::NotConfigured => "not configured",
            SourceStatus::Offline => "offline",
            SourceStatus::Connected => "connected",
            SourceStatus::Stale => "stale",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order_matches_ranking() {
        let ranks: Vec<u8> = SourceKind::BY_PRECEDENCE
            .iter()
            .map(|kind| kind.precedence())
            .collect();
        assert_eq!(ranks, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_source_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SourceKind::Prometheus).unwrap();
        assert_eq!(json, "\"prometheus\"");
    }
}
