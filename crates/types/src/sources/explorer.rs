//! Block explorer source configuration.

use serde::{Deserialize, Serialize};

/// API style of an explorer endpoint candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorerEndpointKind {
    /// `GET` returning JSON
    Rest,
    /// `POST` of a GraphQL query document
    GraphQl,
}

/// One candidate endpoint, tried in configuration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerEndpoint {
    pub kind: ExplorerEndpointKind,
    /// Path relative to the explorer base URL
    pub path: String,
}

impl ExplorerEndpoint {
    pub fn rest(path: impl Into<String>) -> Self {
        Self {
            kind: ExplorerEndpointKind::Rest,
            path: path.into(),
        }
    }

    pub fn graphql(path: impl Into<String>) -> Self {
        Self {
            kind: ExplorerEndpointKind::GraphQl,
            path: path.into(),
        }
    }
}

fn default_base_url() -> String {
    "https://quaiscan.io".to_string()
}

fn default_update_interval() -> u64 {
    30_000
}

fn default_freshness_window() -> u64 {
    120_000
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

fn default_candidates() -> Vec<ExplorerEndpoint> {
    vec![
        ExplorerEndpoint::rest("/api/v2/stats"),
        ExplorerEndpoint::rest("/api/v1/stats"),
        ExplorerEndpoint::rest("/api?module=block&action=eth_block_number"),
        ExplorerEndpoint::graphql("/graphql"),
    ]
}

fn default_rpc_fallback() -> bool {
    true
}

/// Explorer source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
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
    #[serde(default = "default_candidates")]
    pub candidates: Vec<ExplorerEndpoint>,
    /// Derive explorer data from node RPC when every candidate fails
    #[serde(default = "default_rpc_fallback")]
    pub rpc_fallback: bool,
}

impl Default for ExplorerSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            update_interval_ms: default_update_interval(),
            freshness_window_ms: default_freshness_window(),
            timeout_ms: default_timeout(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base(),
            candidates: default_candidates(),
            rpc_fallback: default_rpc_fallback(),
        }
    }
}
