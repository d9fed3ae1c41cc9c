//! Node JSON-RPC metrics source
//!
//! Reads chain state from the node each tick. The block number call doubles
//! as a reachability probe: if it fails, the rest of the tick is skipped.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace};
use quai_dash_core::{MetricsSource, PollError, SourceMetadata};
use quai_dash_rpc::{CallError, HttpClient, RetryPolicy, RpcClient};
use quai_dash_types::{
    MetricField, MetricsSnapshot, NodeSourceConfig, SourceKind, SourcesConfig, SyncStatus,
};
use serde_json::{json, Value};
use std::time::Duration;

use crate::quantity::{lookup, parse_float, parse_quantity};

/// Height, difficulty and timestamp of the latest block
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct ChainHead {
    pub height: Option<u64>,
    pub difficulty: Option<f64>,
    pub timestamp: Option<u64>,
}

impl ChainHead {
    /// Read a block object, flat or with a nested `header`
    pub fn from_block(block: &Value) -> Self {
        Self {
            height: lookup(block, &[&["number"], &["header", "number"]]).and_then(parse_quantity),
            difficulty: lookup(block, &[&["difficulty"], &["header", "difficulty"]])
                .and_then(parse_float),
            timestamp: lookup(block, &[&["timestamp"], &["header", "timestamp"]])
                .and_then(parse_quantity),
        }
    }
}

/// Derives the average block time from consecutive chain heads
#[derive(Debug, Default)]
pub(crate) struct BlockTimeTracker {
    last: Option<(u64, u64)>,
    estimate: Option<f64>,
}

impl BlockTimeTracker {
    /// Feed a (height, timestamp) pair; returns the current estimate in seconds
    pub fn observe(&mut self, height: u64, timestamp: u64) -> Option<f64> {
        match self.last {
            Some((last_height, last_ts)) if height > last_height && timestamp >= last_ts => {
                let blocks = (height - last_height) as f64;
                self.estimate = Some((timestamp - last_ts) as f64 / blocks);
                self.last = Some((height, timestamp));
            }
            Some((last_height, _)) if height < last_height => {
                // Reorg or node switch; start over
                self.last = Some((height, timestamp));
                self.estimate = None;
            }
            Some(_) => {}
            None => self.last = Some((height, timestamp)),
        }
        self.estimate
    }
}

/// RPC client rebuilt whenever the node settings it was built from change
#[derive(Debug, Default)]
pub(crate) struct RpcClientCache {
    cached: Option<(NodeSourceConfig, RpcClient)>,
}

impl RpcClientCache {
    pub fn get(&mut self, node: &NodeSourceConfig) -> Result<&RpcClient, CallError> {
        let entry = match self.cached.take() {
            Some((built_from, client)) if !Self::changed(&built_from, node) => {
                (built_from, client)
            }
            _ => {
                let client = RpcClient::new(
                    &node.rpc_url,
                    Duration::from_millis(node.timeout_ms),
                    RetryPolicy::new(node.retries, Duration::from_millis(node.backoff_base_ms)),
                )?;
                debug!("Node RPC client bound to {}", client.endpoint());
                (node.clone(), client)
            }
        };
        Ok(&self.cached.insert(entry).1)
    }

    fn changed(built_from: &NodeSourceConfig, node: &NodeSourceConfig) -> bool {
        built_from.rpc_url != node.rpc_url
            || built_from.timeout_ms != node.timeout_ms
            || built_from.retries != node.retries
            || built_from.backoff_base_ms != node.backoff_base_ms
    }
}

/// HTTP client rebuilt when its timeout or retry policy changes
#[derive(Debug, Default)]
pub(crate) struct HttpClientCache {
    cached: Option<HttpClient>,
}

impl HttpClientCache {
    pub fn get(&mut self, timeout_ms: u64, retries: u32, backoff_base_ms: u64) -> &HttpClient {
        let timeout = Duration::from_millis(timeout_ms);
        let policy = RetryPolicy::new(retries, Duration::from_millis(backoff_base_ms));
        if let Some(http) = &self.cached {
            if http.timeout() != timeout || *http.policy() != policy {
                self.cached = None;
            }
        }
        self.cached
            .get_or_insert_with(|| HttpClient::with_retries(timeout, policy))
    }
}

/// Metrics source backed by the node's JSON-RPC endpoint
pub struct NodeSource {
    metadata: SourceMetadata,
    clients: RpcClientCache,
    block_times: BlockTimeTracker,
}

impl NodeSource {
    pub fn new() -> Self {
        Self {
            metadata: SourceMetadata {
                kind: SourceKind::Node,
                name: "Node RPC".to_string(),
                description: "Chain state from the node's JSON-RPC endpoint".to_string(),
                provides: vec![
                    MetricField::BlockHeight,
                    MetricField::Difficulty,
                    MetricField::BlockTime,
                    MetricField::NetworkHashRate,
                    MetricField::PeerCount,
                    MetricField::GasPrice,
                    MetricField::PendingTxCount,
                    MetricField::LocalHashRate,
                ],
            },
            clients: RpcClientCache::default(),
            block_times: BlockTimeTracker::default(),
        }
    }
}

impl Default for NodeSource {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_sync_status(value: &Value) -> Option<SyncStatus> {
    match value {
        Value::Bool(false) => Some(SyncStatus::Synced),
        Value::Object(_) => {
            let current = lookup(value, &[&["currentBlock"], &["current_block"]])
                .and_then(parse_quantity)?;
            let highest = lookup(value, &[&["highestBlock"], &["highest_block"]])
                .and_then(parse_quantity)?;
            if current >= highest {
                Some(SyncStatus::Synced)
            } else {
                Some(SyncStatus::Syncing { current, highest })
            }
        }
        _ => None,
    }
}

/// Keep the value of a secondary call, logging (not failing) on error
fn settle(method: &str, result: Result<Value, CallError>) -> Option<Value> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            trace!("{} unavailable this tick: {}", method, err);
            None
        }
    }
}

#[async_trait]
impl MetricsSource for NodeSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn poll(&mut self, config: &SourcesConfig) -> Result<MetricsSnapshot, PollError> {
        let node = &config.node;
        let client = self.clients.get(node)?;

        let block_number_method = node.method("blockNumber");
        let height = client.call(&block_number_method, json!([])).await?;
        let height = parse_quantity(&height)
            .ok_or_else(|| PollError::Unrecognized(format!("block number {}", height)))?;

        let block_method = node.method("getBlockByNumber");
        let gas_method = node.method("gasPrice");
        let syncing_method = node.method("syncing");
        let mining_method = node.method("mining");

        let (block, gas_price, peers, syncing, txpool, mining, hashrate) = tokio::join!(
            client.call(&block_method, json!(["latest", false])),
            client.call(&gas_method, json!([])),
            client.call("net_peerCount", json!([])),
            client.call(&syncing_method, json!([])),
            client.call("txpool_status", json!([])),
            client.call(&mining_method, json!([])),
            client.call_first(&node.hashrate_methods, json!([])),
        );

        let mut snapshot = MetricsSnapshot::new(SourceKind::Node, Utc::now());
        snapshot.block_height = Some(height);

        if let Some(block) = settle(&block_method, block) {
            let head = ChainHead::from_block(&block);
            snapshot.difficulty = head.difficulty;
            if let (Some(block_height), Some(timestamp)) = (head.height, head.timestamp) {
                snapshot.block_time = self.block_times.observe(block_height, timestamp);
            }
        }
        if let (Some(difficulty), Some(block_time)) = (snapshot.difficulty, snapshot.block_time) {
            if block_time > 0.0 {
                snapshot.network_hash_rate = Some(difficulty / block_time);
            }
        }

        snapshot.gas_price = settle(&gas_method, gas_price).as_ref().and_then(parse_quantity);
        snapshot.peer_count = settle("net_peerCount", peers).as_ref().and_then(parse_quantity);
        snapshot.sync_status = settle(&syncing_method, syncing)
            .as_ref()
            .and_then(parse_sync_status);
        snapshot.pending_tx_count = settle("txpool_status", txpool)
            .as_ref()
            .and_then(|status| status.get("pending"))
            .and_then(parse_quantity);
        snapshot.mining = settle(&mining_method, mining).and_then(|v| v.as_bool());
        snapshot.local_hash_rate = match hashrate {
            Ok((method, value)) => {
                trace!("Hashrate answered by {}", method);
                parse_float(&value)
            }
            Err(err) => {
                trace!("No hashrate method answered: {}", err);
                None
            }
        };

        Ok(snapshot)
    }
}
