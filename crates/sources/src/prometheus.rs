//! Prometheus HTTP query API source

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace};
use quai_dash_core::{MetricsSource, PollError, SourceMetadata};
use quai_dash_rpc::{validate_endpoint, CallError};
use quai_dash_types::{MetricField, MetricsSnapshot, SourceKind, SourcesConfig};
use serde_json::Value;
use url::Url;

use crate::node::HttpClientCache;
use crate::quantity::parse_float;

/// Build the instant-query URL for one PromQL expression
fn query_url(base: &Url, query: &str) -> Result<Url, CallError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| CallError::InvalidEndpoint {
            endpoint: base.to_string(),
            reason: "cannot be a base URL".to_string(),
        })?
        .pop_if_empty()
        .extend(&["api", "v1", "query"]);
    url.query_pairs_mut().clear().append_pair("query", query);
    Ok(url)
}

/// Extract the first sample of an instant-query response
///
/// Accepts vector results (`data.result[0].value[1]`) and scalar results
/// (`data.result[1]`). Anything else, including an empty vector, is unknown.
pub(crate) fn parse_instant_value(body: &Value) -> Option<f64> {
    if body.get("status").and_then(Value::as_str) != Some("success") {
        return None;
    }
    let data = body.get("data")?;
    let result = data.get("result")?;
    match data.get("resultType").and_then(Value::as_str) {
        Some("scalar") | Some("string") => result.get(1).and_then(parse_float),
        _ => result
            .get(0)?
            .get("value")?
            .get(1)
            .and_then(parse_float),
    }
}

pub struct PrometheusSource {
    metadata: SourceMetadata,
    http: HttpClientCache,
}

impl PrometheusSource {
    pub fn new() -> Self {
        Self {
            metadata: SourceMetadata {
                kind: SourceKind::Prometheus,
                name: "Prometheus".to_string(),
                description: "Instant queries against a Prometheus server".to_string(),
                provides: MetricField::ALL.to_vec(),
            },
            http: HttpClientCache::default(),
        }
    }
}

impl Default for PrometheusSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for PrometheusSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn poll(&mut self, config: &SourcesConfig) -> Result<MetricsSnapshot, PollError> {
        let prometheus = &config.prometheus;
        if prometheus.queries.is_empty() {
            return Err(PollError::NotConfigured("no queries configured".to_string()));
        }
        let base = validate_endpoint(&prometheus.url)?;
        let http = self.http.get(
            prometheus.timeout_ms,
            prometheus.retries,
            prometheus.backoff_base_ms,
        );

        let mut snapshot = MetricsSnapshot::new(SourceKind::Prometheus, Utc::now());
        let mut answered = 0usize;

        // One query at a time; a transport failure that outlasts its retries ends the tick
        for (field, query) in &prometheus.queries {
            let url = query_url(&base, query)?;
            let body = match http.get_json(url).await {
                Ok(body) => body,
                Err(err) if err.is_retryable() => return Err(err.into()),
                Err(err) => {
                    debug!("Prometheus query {} failed: {}", query, err);
                    continue;
                }
            };
            answered += 1;
            match parse_instant_value(&body) {
                Some(value) => snapshot.set(*field, value),
                None => trace!("Prometheus query {} returned no sample", query),
            }
        }

        if answered == 0 {
            return Err(PollError::Unrecognized(
                "no Prometheus query returned a usable response".to_string(),
            ));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn config_for(server: &MockServer, queries: &[(MetricField, &str)]) -> SourcesConfig {
        let mut config = SourcesConfig::default();
        config.prometheus.enabled = true;
        config.prometheus.url = server.base_url();
        config.prometheus.timeout_ms = 2000;
        config.prometheus.retries = 0;
        config.prometheus.queries = queries
            .iter()
            .map(|(field, query)| (*field, query.to_string()))
            .collect::<BTreeMap<_, _>>();
        config
    }

    fn vector(value: &str) -> Value {
        json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [{"metric": {}, "value": [1700000000.0, value]}]
            }
        })
    }

    #[test]
    fn test_parse_instant_value() {
        assert_eq!(parse_instant_value(&vector("42.5")), Some(42.5));
        assert_eq!(parse_instant_value(&vector("NaN")), None);
        let empty = json!({"status": "success", "data": {"resultType": "vector", "result": []}});
        assert_eq!(parse_instant_value(&empty), None);
        let scalar = json!({
            "status": "success",
            "data": {"resultType": "scalar", "result": [1.0, "7"]}
        });
        assert_eq!(parse_instant_value(&scalar), Some(7.0));
        let error = json!({"status": "error", "errorType": "bad_data", "error": "parse error"});
        assert_eq!(parse_instant_value(&error), None);
    }

    #[test]
    fn test_query_url_encodes_expression() {
        let base = Url::parse("http://prom:9090/").unwrap();
        let url = query_url(&base, "sum(miner_gpu_hashrate)").unwrap();
        assert_eq!(url.path(), "/api/v1/query");
        assert_eq!(url.query(), Some("query=sum%28miner_gpu_hashrate%29"));
    }

    #[tokio::test]
    async fn test_missing_metric_stays_unknown() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/query")
                    .query_param("query", "quai_block_height");
                then.status(200).json_body(vector("1234"));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/query")
                    .query_param("query", "quai_p2p_peers");
                then.status(200).json_body(json!({
                    "status": "success",
                    "data": {"resultType": "vector", "result": []}
                }));
            })
            .await;

        let config = config_for(
            &server,
            &[
                (MetricField::BlockHeight, "quai_block_height"),
                (MetricField::PeerCount, "quai_p2p_peers"),
            ],
        );
        let mut source = PrometheusSource::new();
        let snapshot = source.poll(&config).await.unwrap();
        assert_eq!(snapshot.block_height, Some(1234));
        assert_eq!(snapshot.peer_count, None);
    }

    #[tokio::test]
    async fn test_unavailable_server_retried_within_tick() {
        let server = MockServer::start_async().await;
        let mut unavailable = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/query");
                then.status(503);
            })
            .await;

        let mut config = config_for(&server, &[(MetricField::BlockHeight, "quai_block_height")]);
        config.prometheus.retries = 3;
        config.prometheus.backoff_base_ms = 200;
        let mut source = PrometheusSource::new();
        let swap = async {
            while unavailable.hits_async().await < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            let failed = unavailable.hits_async().await;
            unavailable.delete_async().await;
            let ok = server
                .mock_async(|when, then| {
                    when.method(GET).path("/api/v1/query");
                    then.status(200).json_body(vector("1234"));
                })
                .await;
            (failed, ok)
        };
        let (result, (failed, ok)) = tokio::join!(source.poll(&config), swap);

        assert_eq!(result.unwrap().block_height, Some(1234));
        assert_eq!(failed + ok.hits_async().await, 3);
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_tick() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/query");
                then.status(503);
            })
            .await;

        let mut config = config_for(
            &server,
            &[
                (MetricField::BlockHeight, "quai_block_height"),
                (MetricField::PeerCount, "quai_p2p_peers"),
            ],
        );
        config.prometheus.retries = 1;
        config.prometheus.backoff_base_ms = 1;
        let mut source = PrometheusSource::new();
        let err = source.poll(&config).await.unwrap_err();
        assert_eq!(err, PollError::Call(CallError::HttpError { status: 503 }));
        // first query and its one retry, the second query is never sent
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_empty_query_list_is_not_configured() {
        let server = MockServer::start_async().await;
        let config = config_for(&server, &[]);
        let mut source = PrometheusSource::new();
        let err = source.poll(&config).await.unwrap_err();
        assert!(matches!(err, PollError::NotConfigured(_)));
    }
}
