//! Wallet lookups for the wallet collaborator
//!
//! Addresses are opaque apart from a format check. Whether a transaction is a
//! locked mining reward is decided by a pluggable [`RewardClassifier`]; the
//! shipped heuristic is a best guess, not an authority.

use log::debug;
use quai_dash_rpc::{join_path, validate_endpoint, CallError, HttpClient, RetryPolicy, RpcClient};
use quai_dash_sources::{lookup, parse_quantity, parse_u128};
use quai_dash_types::{ExplorerSourceConfig, NodeSourceConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const WEI_PER_QUAI: f64 = 1e18;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("invalid address '{0}': expected 0x followed by 40 hex characters")]
    InvalidAddress(String),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("unrecognized response: {0}")]
    Unrecognized(String),
}

/// Check the `0x` + 40 hex characters format
pub fn validate_address(address: &str) -> Result<(), LookupError> {
    let valid = address
        .strip_prefix("0x")
        .map_or(false, |hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(())
    } else {
        Err(LookupError::InvalidAddress(address.to_string()))
    }
}

/// Balance and nonce of one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    /// Wei
    pub balance: u128,
    pub tx_count: u64,
}

impl WalletInfo {
    pub fn balance_quai(&self) -> f64 {
        self.balance as f64 / WEI_PER_QUAI
    }
}

/// A transaction as listed by the explorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Wei
    pub value: u128,
    /// Call data, `0x` when empty
    pub input: String,
    /// Explorer's own type label, if any (e.g. `coinbase`)
    pub kind: Option<String>,
}

impl WalletTransaction {
    fn from_item(item: &Value) -> Option<Self> {
        let text = |paths: &[&[&str]]| {
            lookup(item, paths)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Some(Self {
            hash: text(&[&["hash"]])?,
            from: text(&[&["from", "hash"], &["from"]]),
            to: text(&[&["to", "hash"], &["to"]]),
            value: lookup(item, &[&["value"]]).and_then(parse_u128).unwrap_or(0),
            input: text(&[&["raw_input"], &["input"]]).unwrap_or_else(|| "0x".to_string()),
            kind: text(&[&["type"], &["tx_type"]]),
        })
    }
}

/// Decides whether a transaction is a locked mining reward
pub trait RewardClassifier: Send + Sync {
    fn is_locked_reward(&self, tx: &WalletTransaction) -> bool;
}

/// Heuristic classifier
///
/// Treats coinbase-typed transactions, transfers from the zero address and
/// calls whose data starts with one of `input_prefixes` as locked rewards.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    pub input_prefixes: Vec<String>,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self {
            input_prefixes: Vec::new(),
        }
    }
}

impl RewardClassifier for HeuristicClassifier {
    fn is_locked_reward(&self, tx: &WalletTransaction) -> bool {
        let coinbase = tx
            .kind
            .as_deref()
            .map_or(false, |kind| kind.eq_ignore_ascii_case("coinbase"));
        let from_zero = tx
            .from
            .as_deref()
            .and_then(|from| from.strip_prefix("0x"))
            .map_or(false, |hex| !hex.is_empty() && hex.chars().all(|c| c == '0'));
        let prefixed = tx.input.len() > 2
            && self
                .input_prefixes
                .iter()
                .any(|prefix| {
                    tx.input
                        .to_ascii_lowercase()
                        .starts_with(&prefix.to_ascii_lowercase())
                });
        coinbase || from_zero || prefixed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTransaction {
    pub tx: WalletTransaction,
    pub locked_reward: bool,
}

pub fn classify(
    transactions: Vec<WalletTransaction>,
    classifier: &dyn RewardClassifier,
) -> Vec<ClassifiedTransaction> {
    transactions
        .into_iter()
        .map(|tx| ClassifiedTransaction {
            locked_reward: classifier.is_locked_reward(&tx),
            tx,
        })
        .collect()
}

/// Address lookups against the node and the explorer
pub struct WalletLookup {
    rpc: RpcClient,
    node: NodeSourceConfig,
    explorer: Option<(String, HttpClient)>,
}

impl WalletLookup {
    pub fn new(
        node: &NodeSourceConfig,
        explorer: &ExplorerSourceConfig,
    ) -> Result<Self, LookupError> {
        let rpc = RpcClient::new(
            &node.rpc_url,
            Duration::from_millis(node.timeout_ms),
            RetryPolicy::new(node.retries, Duration::from_millis(node.backoff_base_ms)),
        )?;
        let explorer = explorer.enabled.then(|| {
            (
                explorer.base_url.clone(),
                HttpClient::with_retries(
                    Duration::from_millis(explorer.timeout_ms),
                    RetryPolicy::new(
                        explorer.retries,
                        Duration::from_millis(explorer.backoff_base_ms),
                    ),
                ),
            )
        });
        Ok(Self {
            rpc,
            node: node.clone(),
            explorer,
        })
    }

    /// Balance and transaction count of `address`
    pub async fn lookup(&self, address: &str) -> Result<WalletInfo, LookupError> {
        validate_address(address)?;
        let balance_method = self.node.method("getBalance");
        let count_method = self.node.method("getTransactionCount");
        let (balance, tx_count) = tokio::join!(
            self.rpc.call(&balance_method, json!([address, "latest"])),
            self.rpc.call(&count_method, json!([address, "latest"])),
        );
        let balance = balance?;
        let tx_count = tx_count?;
        Ok(WalletInfo {
            address: address.to_string(),
            balance: parse_u128(&balance)
                .ok_or_else(|| LookupError::Unrecognized(format!("balance {}", balance)))?,
            tx_count: parse_quantity(&tx_count).ok_or_else(|| {
                LookupError::Unrecognized(format!("transaction count {}", tx_count))
            })?,
        })
    }

    /// Recent transactions of `address` from the explorer
    ///
    /// Empty when no explorer is enabled.
    pub async fn recent_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<WalletTransaction>, LookupError> {
        validate_address(address)?;
        let Some((base_url, http)) = &self.explorer else {
            return Ok(Vec::new());
        };
        let base = validate_endpoint(base_url)?;
        let url = join_path(&base, &format!("/api/v2/addresses/{}/transactions", address))?;
        let body = http.get_json(url).await?;
        let items = body.get("items").and_then(Value::as_array).ok_or_else(|| {
            LookupError::Unrecognized("transaction list without items".to_string())
        })?;
        let transactions: Vec<_> = items
            .iter()
            .filter_map(WalletTransaction::from_item)
            .collect();
        debug!("{} transactions listed for {}", transactions.len(), address);
        Ok(transactions)
    }
}
