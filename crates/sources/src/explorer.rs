//! Block explorer source
//!
//! Explorers differ in API style, so the poller walks an ordered list of
//! candidate endpoints and keeps the first response whose shape it
//! recognizes. When none answers usefully it can read the same figures
//! from the node instead, and marks the snapshot accordingly.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace};
use quai_dash_core::{MetricsSource, PollError, SourceMetadata};
use quai_dash_rpc::{join_path, validate_endpoint, CallError, HttpClient};
use quai_dash_types::{
    ExplorerEndpoint, ExplorerEndpointKind, MetricField, MetricsSnapshot, SnapshotOrigin,
    SourceKind, SourcesConfig,
};
use serde_json::{json, Value};
use url::Url;

use crate::node::{ChainHead, HttpClientCache, RpcClientCache};
use crate::quantity::{lookup, parse_float, parse_quantity};

/// GraphQL document sent to GraphQL candidates
pub const LATEST_BLOCK_QUERY: &str = "{ block { number difficulty } }";

const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// Response shapes the poller understands
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExplorerResponse {
    /// Blockscout `/api/v2/stats`
    StatsV2 {
        height: Option<u64>,
        block_time_ms: Option<f64>,
        gas_price_gwei: Option<f64>,
    },
    /// camelCase network summary served by Quai explorers
    Summary {
        height: Option<u64>,
        difficulty: Option<f64>,
        block_time: Option<f64>,
        hash_rate: Option<f64>,
        pending: Option<u64>,
    },
    /// Etherscan-style proxy answer carrying the block number in `result`
    Proxy { height: u64 },
    /// GraphQL `data.block`
    GraphQl { height: u64, difficulty: Option<f64> },
}

impl ExplorerResponse {
    fn is_stats_v2(body: &Value) -> bool {
        body.get("total_blocks").is_some() || body.get("average_block_time").is_some()
    }

    fn is_summary(body: &Value) -> bool {
        body.get("blockHeight").is_some() || body.get("latestBlock").is_some()
    }

    fn is_proxy(body: &Value) -> bool {
        body.get("result").map_or(false, Value::is_string)
    }

    fn is_graphql(body: &Value) -> bool {
        lookup(body, &[&["data", "block"]]).map_or(false, Value::is_object)
    }

    /// Classify a response body, `None` when no known shape matches
    pub fn detect(kind: ExplorerEndpointKind, body: &Value) -> Option<Self> {
        match kind {
            ExplorerEndpointKind::GraphQl if Self::is_graphql(body) => {
                let block = lookup(body, &[&["data", "block"]])?;
                let head = ChainHead::from_block(block);
                Some(ExplorerResponse::GraphQl {
                    height: head.height?,
                    difficulty: head.difficulty,
                })
            }
            ExplorerEndpointKind::GraphQl => None,
            ExplorerEndpointKind::Rest if Self::is_stats_v2(body) => {
                let gas = lookup(
                    body,
                    &[&["gas_prices", "average", "price"], &["gas_prices", "average"]],
                );
                let response = ExplorerResponse::StatsV2 {
                    height: body.get("total_blocks").and_then(parse_quantity),
                    block_time_ms: body.get("average_block_time").and_then(parse_float),
                    gas_price_gwei: gas.and_then(parse_float),
                };
                response.has_data().then_some(response)
            }
            ExplorerEndpointKind::Rest if Self::is_summary(body) => {
                let response = ExplorerResponse::Summary {
                    height: lookup(body, &[&["blockHeight"], &["latestBlock"]])
                        .and_then(parse_quantity),
                    difficulty: body.get("difficulty").and_then(parse_float),
                    block_time: body.get("blockTime").and_then(parse_float),
                    hash_rate: lookup(body, &[&["networkHashRate"], &["hashRate"]])
                        .and_then(parse_float),
                    pending: lookup(body, &[&["pendingTransactions"], &["pendingTxCount"]])
                        .and_then(parse_quantity),
                };
                response.has_data().then_some(response)
            }
            ExplorerEndpointKind::Rest if Self::is_proxy(body) => {
                let height = body.get("result").and_then(parse_quantity)?;
                Some(ExplorerResponse::Proxy { height })
            }
            ExplorerEndpointKind::Rest => None,
        }
    }

    fn has_data(&self) -> bool {
        match self {
            ExplorerResponse::StatsV2 {
                height,
                block_time_ms,
                gas_price_gwei,
            } => height.is_some() || block_time_ms.is_some() || gas_price_gwei.is_some(),
            ExplorerResponse::Summary {
                height,
                difficulty,
                block_time,
                hash_rate,
                pending,
            } => {
                height.is_some()
                    || difficulty.is_some()
                    || block_time.is_some()
                    || hash_rate.is_some()
                    || pending.is_some()
            }
            ExplorerResponse::Proxy { .. } | ExplorerResponse::GraphQl { .. } => true,
        }
    }

    /// Copy the recognized values into a snapshot
    pub fn apply(&self, snapshot: &mut MetricsSnapshot) {
        match *self {
            ExplorerResponse::StatsV2 {
                height,
                block_time_ms,
                gas_price_gwei,
            } => {
                snapshot.block_height = height;
                if let Some(ms) = block_time_ms {
                    snapshot.set(MetricField::BlockTime, ms / 1000.0);
                }
                if let Some(gwei) = gas_price_gwei {
                    snapshot.set(MetricField::GasPrice, gwei * WEI_PER_GWEI);
                }
            }
            ExplorerResponse::Summary {
                height,
                difficulty,
                block_time,
                hash_rate,
                pending,
            } => {
                snapshot.block_height = height;
                snapshot.difficulty = difficulty;
                snapshot.block_time = block_time;
                snapshot.network_hash_rate = hash_rate;
                snapshot.pending_tx_count = pending;
            }
            ExplorerResponse::Proxy { height } => snapshot.block_height = Some(height),
            ExplorerResponse::GraphQl { height, difficulty } => {
                snapshot.block_height = Some(height);
                snapshot.difficulty = difficulty;
            }
        }
    }
}

pub struct ExplorerSource {
    metadata: SourceMetadata,
    http: HttpClientCache,
    node_clients: RpcClientCache,
}

impl ExplorerSource {
    pub fn new() -> Self {
        Self {
            metadata: SourceMetadata {
                kind: SourceKind::Explorer,
                name: "Block explorer".to_string(),
                description: "Network statistics from a block explorer API".to_string(),
                provides: vec![
                    MetricField::BlockHeight,
                    MetricField::Difficulty,
                    MetricField::BlockTime,
                    MetricField::NetworkHashRate,
                    MetricField::GasPrice,
                    MetricField::PendingTxCount,
                ],
            },
            http: HttpClientCache::default(),
            node_clients: RpcClientCache::default(),
        }
    }

    async fn fetch(
        http: &HttpClient,
        base: &Url,
        candidate: &ExplorerEndpoint,
    ) -> Result<Value, CallError> {
        let url = join_path(base, &candidate.path)?;
        match candidate.kind {
            ExplorerEndpointKind::Rest => http.get_json(url).await,
            ExplorerEndpointKind::GraphQl => {
                http.post_json(url, &json!({ "query": LATEST_BLOCK_QUERY }))
                    .await
            }
        }
    }

    /// Read height and difficulty from the node when the explorer is unusable
    async fn rpc_fallback(&mut self, config: &SourcesConfig) -> Result<MetricsSnapshot, PollError> {
        let node = &config.node;
        let client = self.node_clients.get(node)?;
        let block = client
            .call(&node.method("getBlockByNumber"), json!(["latest", false]))
            .await?;
        let head = ChainHead::from_block(&block);
        if head.height.is_none() && head.difficulty.is_none() {
            return Err(PollError::Unrecognized("latest block without header".to_string()));
        }

        let mut snapshot = MetricsSnapshot::new(SourceKind::Explorer, Utc::now());
        snapshot.origin = SnapshotOrigin::RpcFallback;
        snapshot.block_height = head.height;
        snapshot.difficulty = head.difficulty;
        Ok(snapshot)
    }
}

impl Default for ExplorerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for ExplorerSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn poll(&mut self, config: &SourcesConfig) -> Result<MetricsSnapshot, PollError> {
        let explorer = &config.explorer;
        let http = self.http.get(
            explorer.timeout_ms,
            explorer.retries,
            explorer.backoff_base_ms,
        );

        let mut last_err = PollError::NotConfigured("no explorer endpoints configured".to_string());
        match validate_endpoint(&explorer.base_url) {
            Ok(base) => {
                for candidate in &explorer.candidates {
                    match Self::fetch(http, &base, candidate).await {
                        Ok(body) => match ExplorerResponse::detect(candidate.kind, &body) {
                            Some(response) => {
                                trace!("Explorer {} answered as {:?}", candidate.path, response);
                                let mut snapshot =
                                    MetricsSnapshot::new(SourceKind::Explorer, Utc::now());
                                response.apply(&mut snapshot);
                                return Ok(snapshot);
                            }
                            None => {
                                debug!("Explorer {}: unrecognized response", candidate.path);
                                last_err = PollError::Unrecognized(candidate.path.clone());
                            }
                        },
                        Err(err) => {
                            debug!("Explorer {} failed: {}", candidate.path, err);
                            last_err = err.into();
                        }
                    }
                }
            }
            Err(err) => last_err = err.into(),
        }

        if explorer.rpc_fallback && config.node.enabled {
            debug!("Explorer unusable ({}), reading from node RPC", last_err);
            return self.rpc_fallback(config).await;
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};

    fn config_for(server: &MockServer) -> SourcesConfig {
        let mut config = SourcesConfig::default();
        config.explorer.enabled = true;
        config.explorer.base_url = server.base_url();
        config.explorer.timeout_ms = 2000;
        config.explorer.backoff_base_ms = 1;
        config.node.rpc_url = server.url("/rpc");
        config.node.retries = 0;
        config
    }

    #[test]
    fn test_detect_stats_v2() {
        let body = json!({
            "total_blocks": "1843211",
            "average_block_time": 5021.0,
            "gas_prices": {"slow": 0.9, "average": 1.5, "fast": 2.0}
        });
        let response = ExplorerResponse::detect(ExplorerEndpointKind::Rest, &body).unwrap();
        let mut snapshot = MetricsSnapshot::new(SourceKind::Explorer, Utc::now());
        response.apply(&mut snapshot);
        assert_eq!(snapshot.block_height, Some(1_843_211));
        assert_eq!(snapshot.block_time, Some(5.021));
        assert_eq!(snapshot.gas_price, Some(1_500_000_000));
        assert_eq!(snapshot.difficulty, None);
    }

    #[test]
    fn test_detect_summary_and_proxy() {
        let summary = json!({"blockHeight": 900, "difficulty": "1000000000", "blockTime": 5.0});
        assert!(matches!(
            ExplorerResponse::detect(ExplorerEndpointKind::Rest, &summary),
            Some(ExplorerResponse::Summary { height: Some(900), .. })
        ));

        let proxy = json!({"jsonrpc": "2.0", "id": 83, "result": "0x384"});
        assert_eq!(
            ExplorerResponse::detect(ExplorerEndpointKind::Rest, &proxy),
            Some(ExplorerResponse::Proxy { height: 900 })
        );
    }

    #[test]
    fn test_detect_rejects_unknown_shapes() {
        let html_error = json!({"message": "Not found"});
        assert_eq!(ExplorerResponse::detect(ExplorerEndpointKind::Rest, &html_error), None);
        let empty_stats = json!({"total_blocks": null});
        assert_eq!(ExplorerResponse::detect(ExplorerEndpointKind::Rest, &empty_stats), None);
        let graphql_error = json!({"errors": [{"message": "unknown field"}]});
        assert_eq!(
            ExplorerResponse::detect(ExplorerEndpointKind::GraphQl, &graphql_error),
            None
        );
    }

    #[tokio::test]
    async fn test_falls_through_to_graphql_candidate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/stats");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/stats");
                then.status(200).json_body(json!({"message": "moved"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(500);
            })
            .await;
        let graphql = server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(200).json_body(json!({
                    "data": {"block": {
                        "number": 4321,
                        "difficulty": "2000000000",
                        "timestamp": 1700000000
                    }}
                }));
            })
            .await;

        let config = config_for(&server);
        let mut source = ExplorerSource::new();
        let snapshot = source.poll(&config).await.unwrap();
        graphql.assert_async().await;
        assert_eq!(snapshot.origin, SnapshotOrigin::Direct);
        assert_eq!(snapshot.block_height, Some(4321));
        assert_eq!(snapshot.difficulty, Some(2e9));
    }

    #[tokio::test]
    async fn test_base_url_path_prefix_is_kept() {
        let server = MockServer::start_async().await;
        let stats = server
            .mock_async(|when, then| {
                when.method(GET).path("/quai/api/v2/stats");
                then.status(200)
                    .json_body(json!({"total_blocks": "77", "average_block_time": 5000.0}));
            })
            .await;

        let mut config = config_for(&server);
        config.explorer.base_url = server.url("/quai");
        let mut source = ExplorerSource::new();
        let snapshot = source.poll(&config).await.unwrap();
        stats.assert_async().await;
        assert_eq!(snapshot.block_height, Some(77));
    }

    #[tokio::test]
    async fn test_total_failure_uses_rpc_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rpc")
                    .json_body_partial(r#"{"method":"quai_getBlockByNumber"}"#);
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {"number": "0x10", "difficulty": "0x100", "timestamp": "0x1"}
                }));
            })
            .await;

        let config = config_for(&server);
        let mut source = ExplorerSource::new();
        let snapshot = source.poll(&config).await.unwrap();
        assert_eq!(snapshot.source, SourceKind::Explorer);
        assert_eq!(snapshot.origin, SnapshotOrigin::RpcFallback);
        assert_eq!(snapshot.effective_precedence(), SourceKind::Node.precedence());
        assert_eq!(snapshot.block_height, Some(16));
        assert_eq!(snapshot.difficulty, Some(256.0));
    }

    #[tokio::test]
    async fn test_fallback_disabled_returns_last_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|_when, then| {
                then.status(404);
            })
            .await;

        let mut config = config_for(&server);
        config.explorer.rpc_fallback = false;
        let mut source = ExplorerSource::new();
        let err = source.poll(&config).await.unwrap_err();
        assert_eq!(err, PollError::Call(CallError::HttpError { status: 404 }));
    }
}
