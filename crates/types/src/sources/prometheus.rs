//! Prometheus source configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::snapshot::MetricField;

fn default_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_update_interval() -> u64 {
    10_000
}

fn default_freshness_window() -> u64 {
    60_000
}

fn default_timeout() -> u64 {
    10_000
}

fn default_retries() -> u32 {
    2
}

fn default_backoff_base() -> u64 {
    500
}

fn default_queries() -> BTreeMap<MetricField, String> {
    let mut queries = BTreeMap::new();
    queries.insert(MetricField::BlockHeight, "quai_block_height".to_string());
    queries.insert(MetricField::Difficulty, "quai_block_difficulty".to_string());
    queries.insert(MetricField::NetworkHashRate, "quai_network_hashrate".to_string());
    queries.insert(MetricField::PeerCount, "quai_p2p_peers".to_string());
    queries.insert(MetricField::LocalHashRate, "sum(miner_gpu_hashrate)".to_string());
    queries.insert(MetricField::PowerUsage, "sum(miner_gpu_power_watts)".to_string());
    queries.insert(MetricField::AcceptedShares, "miner_shares_accepted_total".to_string());
    queries.insert(MetricField::RejectedShares, "miner_shares_rejected_total".to_string());
    queries
}

/// Prometheus source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrometheusSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
    #[serde(default = "default_freshness_window")]
    pub freshness_window_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Retries of a failed request, transport failures only
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// PromQL expression per snapshot field, queried in key order
    #[serde(default = "default_queries")]
    pub queries: BTreeMap<MetricField, String>,
}

impl Default for PrometheusSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_url(),
            update_interval_ms: default_update_interval(),
            freshness_window_ms: default_freshness_window(),
            timeout_ms: default_timeout(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base(),
            queries: default_queries(),
        }
    }
}
