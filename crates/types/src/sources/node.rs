//! Node JSON-RPC source configuration.

use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

fn default_rpc_url() -> String {
    "http://localhost:9001".to_string()
}

fn default_update_interval() -> u64 {
    5000
}

fn default_freshness_window() -> u64 {
    30_000
}

fn default_timeout() -> u64 {
    10_000
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_method_prefix() -> String {
    "quai".to_string()
}

fn default_hashrate_methods() -> Vec<String> {
    vec!["eth_hashrate".to_string(), "quai_hashrate".to_string()]
}

/// Node source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
    #[serde(default = "default_freshness_window")]
    pub freshness_window_ms: u64,
    /// Hard per-attempt timeout
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Namespace of the chain-specific methods, e.g. `quai` for `quai_blockNumber`
    #[serde(default = "default_method_prefix")]
    pub method_prefix: String,
    /// Hashrate methods in the order they are tried
    #[serde(default = "default_hashrate_methods")]
    pub hashrate_methods: Vec<String>,
}

impl NodeSourceConfig {
    /// Full method name in the chain namespace
    pub fn method(&self, name: &str) -> String {
        format!("{}_{}", self.method_prefix, name)
    }
}

impl Default for NodeSourceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            rpc_url: default_rpc_url(),
            update_interval_ms: default_update_interval(),
            freshness_window_ms: default_freshness_window(),
            timeout_ms: default_timeout(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base(),
            method_prefix: default_method_prefix(),
            hashrate_methods: default_hashrate_methods(),
        }
    }
}
