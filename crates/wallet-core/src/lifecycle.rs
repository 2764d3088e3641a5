//! Gas estimation, submission through the connected wallet and receipt
//! polling.

use std::sync::Arc;
use std::time::Duration;

use chain_eth::{TransactionRequest, TxReceipt};
use eth_rpc::RpcProvider;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::signer::TransactionSigner;

/// Outcome of a gas estimate. Failure is a value, not an error: the caller
/// falls back to a manual limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GasEstimate {
    Estimated { gas_limit: u64 },
    Unavailable { reason: String },
}

impl GasEstimate {
    pub fn gas_limit(&self) -> Option<u64> {
        match self {
            GasEstimate::Estimated { gas_limit } => Some(*gas_limit),
            GasEstimate::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    /// Headroom added on top of `eth_estimateGas` when the wallet fills in
    /// the gas limit, in percent.
    pub gas_buffer_percent: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(2), max_wait: Duration::from_secs(120), gas_buffer_percent: 20 }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionLifecycle {
    provider: Arc<RpcProvider>,
    signer: Arc<dyn TransactionSigner>,
    config: LifecycleConfig,
}

impl TransactionLifecycle {
    pub fn new(provider: Arc<RpcProvider>, signer: Arc<dyn TransactionSigner>, config: LifecycleConfig) -> Self {
        Self { provider, signer, config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> GasEstimate {
        match self.provider.estimate_gas(tx).await {
            Ok(gas_limit) => GasEstimate::Estimated { gas_limit },
            Err(e) => {
                warn!(chain_id = self.provider.chain_id(), to = %tx.to, error = %e, "gas estimation unavailable");
                GasEstimate::Unavailable { reason: e.to_string() }
            }
        }
    }

    /// Hands `tx` to the connected wallet and returns its hash.
    ///
    /// `from` and `chain_id` are taken from the session. A missing gas limit
    /// is filled from an estimate plus the configured buffer; if estimation
    /// fails the wallet picks one.
    pub async fn send(&self, tx: &TransactionRequest) -> Result<String, WalletError> {
        let from = self.signer.address().ok_or(WalletError::NotConnected)?;
        let chain_id = self.provider.chain_id();
        if let Some(wallet_chain) = self.signer.chain_id() {
            if wallet_chain != chain_id {
                return Err(WalletError::InvalidArgument(format!(
                    "wallet is on chain {wallet_chain}, provider is on chain {chain_id}"
                )));
            }
        }
        if let Some(requested) = tx.chain_id {
            if requested != chain_id {
                return Err(WalletError::InvalidArgument(format!(
                    "transaction targets chain {requested}, provider is on chain {chain_id}"
                )));
            }
        }

        let mut tx = tx.clone().with_from(from).with_chain_id(chain_id);
        if tx.gas_limit.is_none() {
            if let Some(estimate) = self.estimate_gas(&tx).await.gas_limit() {
                tx = tx.with_gas_limit(buffered(estimate, self.config.gas_buffer_percent));
            }
        }

        let hash = self.signer.send_transaction(&tx).await?;
        info!(chain_id, hash = %hash, gas_limit = ?tx.gas_limit, "transaction submitted");
        Ok(hash)
    }

    /// Polls for a receipt every `poll_interval` until one appears or
    /// `max_wait` has elapsed, in which case the receipt is `Pending`.
    /// Transport failures while polling are logged and retried.
    pub async fn wait_for_receipt(
        &self,
        hash: &str,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<TxReceipt, WalletError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let poll = tokio::time::timeout(remaining, self.provider.get_transaction_receipt(hash)).await;
            match poll {
                Ok(Ok(Some(receipt))) => {
                    let receipt = receipt.to_tx_receipt();
                    info!(hash, status = ?receipt.status, block = ?receipt.block_number, "receipt found");
                    return Ok(receipt);
                }
                Ok(Ok(None)) => debug!(hash, "receipt not yet available"),
                Ok(Err(e)) if e.is_transport() => warn!(hash, error = %e, "receipt poll failed, retrying"),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => debug!(hash, "receipt poll cut off at deadline"),
            }

            let now = Instant::now();
            if now >= deadline {
                info!(hash, waited = ?max_wait, "still pending");
                return Ok(TxReceipt::pending(hash));
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// `send` followed by `wait_for_receipt` with the configured timings.
    pub async fn send_and_wait(&self, tx: &TransactionRequest) -> Result<TxReceipt, WalletError> {
        let hash = self.send(tx).await?;
        self.wait_for_receipt(&hash, self.config.poll_interval, self.config.max_wait).await
    }
}

fn buffered(estimate: u64, percent: u64) -> u64 {
    estimate.saturating_mul(100 + percent) / 100
}
