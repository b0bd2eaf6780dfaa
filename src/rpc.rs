//! Minimal Ethereum JSON-RPC client over HTTP.
//!
//! Only the handful of read calls the polling sources need. Responses are
//! decoded into alloy's RPC types, then flattened into domain events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_consensus::Transaction as _;
use alloy_primitives::U64;
use alloy_rpc_types_eth::{Block, BlockTransactions, Header, Log, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::{HeaderObserved, LogObserved, TransactionObserved};

/// Errors from talking to a node
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Node returned error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Node returned no result for {0}")]
    EmptyResult(String),

    #[error("Node response is missing {0}")]
    Incomplete(&'static str),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Address/topic filter for `eth_getLogs`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Contract addresses to match (empty = any)
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Topic alternatives per position (empty position = any)
    #[serde(default)]
    pub topics: Vec<Vec<String>>,
}

impl LogFilter {
    fn to_params(&self, from_block: u64, to_block: u64) -> Value {
        let topics: Vec<Value> = self
            .topics
            .iter()
            .map(|alternatives| {
                if alternatives.is_empty() {
                    Value::Null
                } else {
                    json!(alternatives)
                }
            })
            .collect();

        let mut filter = json!({
            "fromBlock": quantity(from_block),
            "toBlock": quantity(to_block),
        });
        if !self.addresses.is_empty() {
            filter["address"] = json!(self.addresses);
        }
        if !topics.is_empty() {
            filter["topics"] = Value::Array(topics);
        }
        filter
    }
}

/// JSON-RPC client for one node
#[derive(Debug)]
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcClient {
    /// Create a client with a per-request timeout
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decode_response(method, response)
    }

    /// Height of the latest block
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let number: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    /// Header of the latest block
    pub async fn latest_header(&self) -> Result<HeaderObserved, RpcError> {
        let header: Header = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        Ok(header_event(&header))
    }

    /// Transactions of one block, in block order
    pub async fn block_transactions(&self, number: u64) -> Result<Vec<TransactionObserved>, RpcError> {
        let block: Block = self
            .call("eth_getBlockByNumber", json!([quantity(number), true]))
            .await?;
        block_transaction_events(block)
    }

    /// Logs matching `filter` in the inclusive block range
    pub async fn logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogObserved>, RpcError> {
        let logs: Vec<Log> = self
            .call("eth_getLogs", json!([filter.to_params(from_block, to_block)]))
            .await?;
        logs.into_iter().map(log_event).collect()
    }
}

fn decode_response<T: DeserializeOwned>(method: &str, response: RpcResponse) -> Result<T, RpcError> {
    if let Some(error) = response.error {
        return Err(RpcError::Remote {
            code: error.code,
            message: error.message,
        });
    }
    match response.result {
        None | Some(Value::Null) => Err(RpcError::EmptyResult(method.to_string())),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

/// Encode a block number as a JSON-RPC quantity
fn quantity(value: u64) -> Value {
    json!(U64::from(value))
}

fn header_event(header: &Header) -> HeaderObserved {
    HeaderObserved {
        number: header.inner.number,
        hash: header.hash.to_string(),
        timestamp: header.inner.timestamp,
    }
}

fn block_transaction_events(block: Block) -> Result<Vec<TransactionObserved>, RpcError> {
    match block.transactions {
        BlockTransactions::Full(transactions) => {
            Ok(transactions.iter().map(transaction_event).collect())
        }
        BlockTransactions::Hashes(hashes) if hashes.is_empty() => Ok(Vec::new()),
        _ => Err(RpcError::Incomplete("full transaction bodies")),
    }
}

fn transaction_event(tx: &Transaction) -> TransactionObserved {
    TransactionObserved {
        hash: tx.inner.tx_hash().to_string(),
        from: tx.from.to_string(),
        to: tx.inner.to().map(|to| to.to_string()),
        // Wei, in decimal
        value: tx.inner.value().to_string(),
    }
}

fn log_event(log: Log) -> Result<LogObserved, RpcError> {
    Ok(LogObserved {
        address: log.inner.address.to_string(),
        topics: log.inner.data.topics().iter().map(|t| t.to_string()).collect(),
        data: log.inner.data.data.to_vec(),
        block_number: log.block_number.ok_or(RpcError::Incomplete("blockNumber"))?,
        block_hash: log
            .block_hash
            .ok_or(RpcError::Incomplete("blockHash"))?
            .to_string(),
        transaction_hash: log
            .transaction_hash
            .ok_or(RpcError::Incomplete("transactionHash"))?
            .to_string(),
        transaction_index: log
            .transaction_index
            .ok_or(RpcError::Incomplete("transactionIndex"))?,
        log_index: log.log_index.ok_or(RpcError::Incomplete("logIndex"))?,
    })
}
