//! Chain-bound JSON-RPC provider: endpoint failover, response caching,
//! per-request deadline and the typed `eth_*` helpers.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use chain_eth::abi::encode_hex;
use chain_eth::{Address, Chain, Log, TransactionRequest};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::ResponseCache;
use crate::error::RpcError;
use crate::transport::{HttpTransport, JsonRpcClient};
use crate::types::{parse_bytes, parse_log, parse_u256, parse_u64, BlockTag, LogFilter, RpcReceipt};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub struct RpcProvider {
    chain_id: u64,
    transports: Vec<Arc<dyn JsonRpcClient>>,
    cache: ResponseCache,
    timeout: Duration,
}

impl RpcProvider {
    /// HTTP provider over the chain's primary and backup RPC URLs.
    pub fn new(chain: &Chain) -> Self {
        let client = reqwest::Client::new();
        let transports = chain
            .rpc_urls()
            .into_iter()
            .map(|url| {
                Arc::new(HttpTransport::with_client(url, client.clone())) as Arc<dyn JsonRpcClient>
            })
            .collect();
        Self::with_transports(chain.chain_id, transports)
    }

    /// Provider over arbitrary transports, tried in the given order.
    pub fn with_transports(chain_id: u64, transports: Vec<Arc<dyn JsonRpcClient>>) -> Self {
        Self { chain_id, transports, cache: ResponseCache::new(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn endpoints(&self) -> Vec<&str> {
        self.transports.iter().map(|t| t.endpoint()).collect()
    }

    /// Dispatches one JSON-RPC call.
    ///
    /// Transport failures and timeouts move on to the next endpoint, each
    /// endpoint being tried at most once. JSON-RPC error envelopes are
    /// returned immediately. With `use_cache`, a cached answer for the same
    /// (method, params) is returned without a round trip.
    pub async fn call(&self, method: &str, params: Value, use_cache: bool) -> Result<Value, RpcError> {
        if use_cache {
            if let Some(hit) = self.cache.get(method, &params) {
                debug!(chain_id = self.chain_id, method, "rpc cache hit");
                return Ok(hit);
            }
        }

        let mut last_err = RpcError::NoEndpoints;
        for (attempt, transport) in self.transports.iter().enumerate() {
            let outcome = tokio::time::timeout(self.timeout, transport.request(method, params.clone()))
                .await
                .unwrap_or_else(|_| {
                    Err(RpcError::Timeout {
                        method: method.to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    })
                });

            match outcome {
                Ok(value) => {
                    if use_cache {
                        self.cache.insert(method, &params, value.clone());
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transport() => {
                    warn!(
                        chain_id = self.chain_id,
                        endpoint = transport.endpoint(),
                        attempt,
                        method,
                        error = %err,
                        "rpc endpoint failed, trying next"
                    );
                    last_err = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// `eth_call` against `to` with raw calldata; returns the raw return data.
    pub async fn eth_call(
        &self,
        to: &Address,
        data: &[u8],
        block: BlockTag,
        use_cache: bool,
    ) -> Result<Vec<u8>, RpcError> {
        let tx = json!({ "to": to.to_string(), "data": encode_hex(data) });
        let result = self.call("eth_call", json!([tx, block.to_json()]), use_cache).await?;
        parse_bytes(&result)
    }

    pub async fn get_balance(&self, address: &Address, block: BlockTag) -> Result<U256, RpcError> {
        let result = self
            .call("eth_getBalance", json!([address.to_string(), block.to_json()]), false)
            .await?;
        parse_u256(&result)
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, RpcError> {
        let result = self.call("eth_estimateGas", json!([tx.to_rpc_json()]), false).await?;
        parse_u64(&result)
    }

    pub async fn get_gas_price(&self) -> Result<U256, RpcError> {
        let result = self.call("eth_gasPrice", json!([]), false).await?;
        parse_u256(&result)
    }

    pub async fn get_transaction_count(&self, address: &Address, block: BlockTag) -> Result<u64, RpcError> {
        let result = self
            .call("eth_getTransactionCount", json!([address.to_string(), block.to_json()]), false)
            .await?;
        parse_u64(&result)
    }

    /// Broadcasts a signed transaction and returns its hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        let result = self.call("eth_sendRawTransaction", json!([encode_hex(raw)]), false).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidResponse(format!("expected tx hash, got {result}")))
    }

    /// `None` while the transaction is unknown or not yet mined.
    pub async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<RpcReceipt>, RpcError> {
        let result = self.call("eth_getTransactionReceipt", json!([tx_hash]), false).await?;
        if result.is_null() {
            return Ok(None);
        }
        RpcReceipt::from_json(&result).map(Some)
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_blockNumber", json!([]), false).await?;
        parse_u64(&result)
    }

    /// Chain id as reported by the node (cached).
    pub async fn fetch_chain_id(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_chainId", json!([]), true).await?;
        parse_u64(&result)
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcError> {
        let result = self.call("eth_getLogs", json!([filter.to_json()]), false).await?;
        result
            .as_array()
            .ok_or_else(|| RpcError::InvalidResponse(format!("expected log array, got {result}")))?
            .iter()
            .map(parse_log)
            .collect()
    }
}
