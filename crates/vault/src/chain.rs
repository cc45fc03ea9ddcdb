//! Read-only chain access: logs, block timestamps and the head block number.
//!
//! [ChainClient] is the seam the scanner depends on; [HttpChainClient] implements it over
//! plain JSON-RPC. No retries happen here, callers decide what to do with a [ChainError].

use crate::abi::{hex_address, hex_b256, parse_hex_u64, RawLog};
use crate::config::Network;
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain unavailable: {0}")]
    Unavailable(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("block {0} not found")]
    BlockNotFound(u64),
    #[error("connected to chain id {actual}, expected {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Logs emitted by `address` with any of `topics` as topic0, in `[from_block, to_block]`.
    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainError>;

    async fn get_block_timestamp(&self, block_number: u64) -> Result<DateTime<Utc>, ChainError>;

    async fn get_head_block_number(&self) -> Result<u64, ChainError>;
}

fn build_logs_filter(address: &Address, topics: &[B256], from_block: u64, to_block: u64) -> Value {
    // Nested array: topic0 may be any of the listed hashes.
    let topic0: Vec<String> = topics.iter().map(hex_b256).collect();
    json!({
        "address": hex_address(address),
        "topics": [topic0],
        "fromBlock": format!("0x{:x}", from_block),
        "toBlock": format!("0x{:x}", to_block),
    })
}

fn timestamp_from_secs(secs: u64) -> Result<DateTime<Utc>, ChainError> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| ChainError::Decode(format!("timestamp {secs} out of range")))
}

fn hex_quantity(value: &Value, what: &str) -> Result<u64, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("{what} not string")))?;
    parse_hex_u64(s).map_err(|e| ChainError::Decode(format!("{what}: {e}")))
}

/// JSON-RPC client over HTTP.
pub struct HttpChainClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpChainClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn http_json_rpc(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let json: Value = resp.json().await?;
        if let Some(err) = json.get("error") {
            return Err(ChainError::Rpc(err.to_string()));
        }
        json.get("result")
            .cloned()
            .ok_or_else(|| ChainError::Decode("missing result".into()))
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let result = self.http_json_rpc("eth_chainId", json!([])).await?;
        hex_quantity(&result, "chainId")
    }

    /// Fail unless the endpoint serves `network`.
    pub async fn verify_network(&self, network: Network) -> Result<(), ChainError> {
        let actual = self.chain_id().await?;
        let expected = network.chain_id();
        if actual != expected {
            return Err(ChainError::WrongNetwork { expected, actual });
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainError> {
        let filter = build_logs_filter(&address, topics, from_block, to_block);
        let result = self.http_json_rpc("eth_getLogs", json!([filter])).await?;
        serde_json::from_value(result).map_err(|e| ChainError::Decode(format!("getLogs: {e}")))
    }

    async fn get_block_timestamp(&self, block_number: u64) -> Result<DateTime<Utc>, ChainError> {
        let result = self
            .http_json_rpc(
                "eth_getBlockByNumber",
                json!([format!("0x{:x}", block_number), false]),
            )
            .await?;
        if result.is_null() {
            return Err(ChainError::BlockNotFound(block_number));
        }
        let secs = hex_quantity(&result["timestamp"], "timestamp")?;
        timestamp_from_secs(secs)
    }

    async fn get_head_block_number(&self) -> Result<u64, ChainError> {
        let result = self.http_json_rpc("eth_blockNumber", json!([])).await?;
        hex_quantity(&result, "blockNumber")
    }
}
