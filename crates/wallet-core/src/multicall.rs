use std::sync::Arc;

use chain_eth::decode::decode_uint256;
use chain_eth::multicall::{
    decode_aggregate, decode_aggregate3, encode_aggregate, encode_aggregate3, encode_get_eth_balance,
    AggregateResult, Call, Call3, CallResult, MULTICALL3_ADDRESS,
};
use chain_eth::{erc20, Address, U256};
use eth_rpc::{BlockTag, RpcProvider};
use tracing::{debug, warn};

use crate::error::WalletError;

/// Batches independent reads into a single `eth_call` against Multicall3.
#[derive(Debug, Clone)]
pub struct CallAggregator {
    provider: Arc<RpcProvider>,
    address: Address,
}

impl CallAggregator {
    pub fn new(provider: Arc<RpcProvider>) -> Self {
        Self { provider, address: MULTICALL3_ADDRESS }
    }

    /// For chains where Multicall3 lives somewhere other than its canonical address.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// All-or-nothing batch: a single failing call reverts the whole `eth_call`.
    pub async fn aggregate(&self, calls: &[Call]) -> Result<AggregateResult, WalletError> {
        if calls.is_empty() {
            return Ok(AggregateResult { block_number: U256::ZERO, return_data: Vec::new() });
        }
        let data = self.provider.eth_call(&self.address, &encode_aggregate(calls), BlockTag::Latest, false).await?;
        let result = decode_aggregate(&data)?;
        debug!(calls = calls.len(), block = %result.block_number, "aggregate");
        Ok(result)
    }

    /// Batch where each call decides whether its failure aborts the rest.
    /// Results are parallel to `calls`.
    pub async fn aggregate3(&self, calls: &[Call3]) -> Result<Vec<CallResult>, WalletError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.provider.eth_call(&self.address, &encode_aggregate3(calls), BlockTag::Latest, false).await?;
        let results = decode_aggregate3(&data)?;
        if results.len() != calls.len() {
            return Err(WalletError::InvalidArgument(format!(
                "aggregate3 returned {} results for {} calls",
                results.len(),
                calls.len()
            )));
        }
        let failed = results.iter().filter(|r| !r.success).count();
        debug!(calls = calls.len(), failed, "aggregate3");
        Ok(results)
    }

    /// `balanceOf(owner)` across many tokens. A token that reverts or returns
    /// garbage yields `None` instead of failing the batch.
    pub async fn token_balances(&self, owner: &Address, tokens: &[Address]) -> Result<Vec<Option<U256>>, WalletError> {
        let calls: Vec<Call3> =
            tokens.iter().map(|token| Call3::new(*token, erc20::encode_balance_of(owner))).collect();
        let results = self.aggregate3(&calls).await?;
        Ok(tokens.iter().zip(results).map(|(token, r)| uint_result(token, r)).collect())
    }

    /// Native balances of many accounts via Multicall3's own `getEthBalance`.
    pub async fn native_balances(&self, accounts: &[Address]) -> Result<Vec<U256>, WalletError> {
        let calls: Vec<Call3> =
            accounts.iter().map(|account| Call3::required(self.address, encode_get_eth_balance(account))).collect();
        let results = self.aggregate3(&calls).await?;
        results.iter().map(|r| Ok(decode_uint256(&r.return_data)?)).collect()
    }
}

fn uint_result(target: &Address, result: CallResult) -> Option<U256> {
    if !result.success {
        debug!(%target, "batched call reverted");
        return None;
    }
    match decode_uint256(&result.return_data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%target, error = %e, "undecodable batched return data");
            None
        }
    }
}
