//! Scripted RPC endpoint and signer shared by the unit tests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chain_eth::abi::{decode_hex, encode_hex};
use chain_eth::{Address, TransactionRequest, U256};
use eth_rpc::{JsonRpcClient, RpcError, RpcProvider};
use parking_lot::Mutex;
use serde_json::{json, Value};
use wallet_connect::DeepLinkLauncher;

use crate::error::WalletError;
use crate::signer::TransactionSigner;

type Handler = dyn Fn(&str, &Value) -> Result<Value, RpcError> + Send + Sync;

pub struct MockRpc {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl fmt::Debug for MockRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRpc").field("calls", &self.calls.lock().len()).finish()
    }
}

impl MockRpc {
    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl JsonRpcClient for MockRpc {
    fn endpoint(&self) -> &str {
        "mock://rpc"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.calls.lock().push((method.to_string(), params.clone()));
        (self.handler)(method, &params)
    }
}

pub fn mock_provider<F>(chain_id: u64, handler: F) -> (Arc<RpcProvider>, Arc<MockRpc>)
where
    F: Fn(&str, &Value) -> Result<Value, RpcError> + Send + Sync + 'static,
{
    let rpc = Arc::new(MockRpc { handler: Box::new(handler), calls: Mutex::new(Vec::new()) });
    let provider = RpcProvider::with_transports(chain_id, vec![rpc.clone() as Arc<dyn JsonRpcClient>]);
    (Arc::new(provider), rpc)
}

/// Calldata of an `eth_call` / `eth_estimateGas` request.
pub fn call_data(params: &Value) -> Vec<u8> {
    params[0]["data"].as_str().map(|d| decode_hex(d).unwrap()).unwrap_or_default()
}

pub fn selector(params: &Value) -> [u8; 4] {
    let data = call_data(params);
    [data[0], data[1], data[2], data[3]]
}

pub fn word(value: U256) -> Value {
    json!(encode_hex(&value.to_be_bytes::<32>()))
}

pub fn revert() -> RpcError {
    RpcError::Rpc { code: 3, message: "execution reverted".into(), data: None }
}

pub fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address::new(bytes)
}

/// Signer that records every transaction and answers with sequential hashes.
#[derive(Debug)]
pub struct MockSigner {
    pub address: Option<Address>,
    pub chain_id: u64,
    pub sent: Mutex<Vec<TransactionRequest>>,
    counter: AtomicU64,
}

impl MockSigner {
    pub fn connected(address: Address, chain_id: u64) -> Arc<Self> {
        Arc::new(Self { address: Some(address), chain_id, sent: Mutex::new(Vec::new()), counter: AtomicU64::new(0) })
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self { address: None, chain_id: 1, sent: Mutex::new(Vec::new()), counter: AtomicU64::new(0) })
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> Option<Address> {
        self.address
    }

    fn chain_id(&self) -> Option<u64> {
        self.address.map(|_| self.chain_id)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, WalletError> {
        if self.address.is_none() {
            return Err(WalletError::NotConnected);
        }
        self.sent.lock().push(tx.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("0x{n:064x}"))
    }
}

/// Launcher for a device without any wallet app.
#[derive(Debug)]
pub struct NotInstalled;

#[async_trait]
impl DeepLinkLauncher for NotInstalled {
    async fn can_launch(&self, _uri: &str) -> bool {
        false
    }

    async fn launch(&self, _uri: &str) -> bool {
        false
    }
}
