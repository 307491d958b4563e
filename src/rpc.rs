//! JSON-RPC client for Ethereum nodes
//!
//! Provides a typed interface to the node endpoints the monitor uses.
//! Transport failures, RPC-level `error` objects and uninterpretable results
//! map to distinct `MonitorError` variants.

use crate::error::{MonitorError, Result};
use crate::fetcher::{require_found, BlockId, TransactionFetcher};
use crate::types::{parse_hex_u256, parse_hex_u64, BlockSummary, Receipt, Transaction, TxPoolStatus};
use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcClient {
    /// Create a new RPC client whose requests give up after `timeout`.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make a JSON-RPC call and return the raw `result` value.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        debug!(method, id, "rpc request");

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Transport(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MonitorError::Transport(format!("unreadable {} response: {}", method, e)))?;

        extract_result(method, body)
    }

    /// Call and deserialize a non-null result.
    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let result = self.call(method, params).await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| MonitorError::MalformedResponse {
                method: method.to_string(),
                reason: e.to_string(),
            })
    }

    /// Call a method whose result is a single hex string.
    async fn call_hex(&self, method: &str, params: Value) -> Result<String> {
        let result = self.call(method, params).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| MonitorError::MalformedResponse {
                method: method.to_string(),
                reason: format!("expected hex string, got {}", result),
            })
    }

    /// Current head block number (`eth_blockNumber`).
    pub async fn block_number(&self) -> Result<u64> {
        let raw = self.call_hex("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&raw).map_err(|reason| malformed("eth_blockNumber", reason))
    }

    /// Current gas price in wei (`eth_gasPrice`).
    pub async fn gas_price(&self) -> Result<U256> {
        let raw = self.call_hex("eth_gasPrice", json!([])).await?;
        parse_hex_u256(&raw).map_err(|reason| malformed("eth_gasPrice", reason))
    }

    /// Pending and queued counts (`txpool_status`).
    pub async fn txpool_status(&self) -> Result<TxPoolStatus> {
        self.call_typed("txpool_status", json!([]))
            .await?
            .ok_or_else(|| malformed("txpool_status", "null result".to_string()))
    }
}

#[async_trait]
impl TransactionFetcher for RpcClient {
    async fn get_block(&self, block: &BlockId) -> Result<BlockSummary> {
        let params = json!([block.to_param(), false]);
        self.call_typed("eth_getBlockByNumber", params)
            .await?
            .ok_or_else(|| MonitorError::BlockNotFound(block.to_string()))
    }

    async fn get_transaction(&self, hash: B256) -> Result<Transaction> {
        let params = json!([format!("0x{:x}", hash)]);
        let tx = self.call_typed("eth_getTransactionByHash", params).await?;
        require_found(tx, hash)
    }

    async fn get_receipt(&self, hash: B256) -> Result<Receipt> {
        let params = json!([format!("0x{:x}", hash)]);
        let receipt = self.call_typed("eth_getTransactionReceipt", params).await?;
        require_found(receipt, hash)
    }

    async fn chain_id(&self) -> Result<u64> {
        let raw = self.call_hex("eth_chainId", json!([])).await?;
        parse_hex_u64(&raw).map_err(|reason| malformed("eth_chainId", reason))
    }
}

fn malformed(method: &str, reason: String) -> MonitorError {
    MonitorError::MalformedResponse {
        method: method.to_string(),
        reason,
    }
}

/// Unwrap a JSON-RPC 2.0 response envelope.
///
/// An `error` member always wins, even if a `result` is also present.
fn extract_result(method: &str, mut body: Value) -> Result<Value> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return match serde_json::from_value::<RpcErrorObject>(error.clone()) {
            Ok(err) => Err(MonitorError::Protocol {
                code: err.code,
                message: err.message,
            }),
            Err(_) => Err(MonitorError::Protocol {
                code: 0,
                message: error.to_string(),
            }),
        };
    }

    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(malformed(method, "response missing 'result' field".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": "0xb"});
        assert_eq!(extract_result("eth_blockNumber", body).unwrap(), json!("0xb"));
    }

    #[test]
    fn test_extract_null_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": null});
        assert!(extract_result("eth_getTransactionByHash", body).unwrap().is_null());
    }

    #[test]
    fn test_extract_rpc_error() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "the method txpool_status does not exist"}
        });
        match extract_result("txpool_status", body) {
            Err(MonitorError::Protocol { code, message }) => {
                assert_eq!(code, -32601);
                assert!(message.contains("txpool_status"));
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_missing_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1});
        assert!(matches!(
            extract_result("eth_gasPrice", body),
            Err(MonitorError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_client_builds_with_timeout() {
        let client = RpcClient::new("http://127.0.0.1:8545".to_string(), Duration::from_secs(2)).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:8545");
    }
}
