use std::sync::Arc;

use chain_eth::decode::{decode_bool, decode_string, decode_uint256, decode_uint256_array};
use chain_eth::erc1155::{
    self, substitute_uri_id, TransferBatchEvent, TransferSingleEvent, TRANSFER_BATCH_EVENT_TOPIC,
    TRANSFER_SINGLE_EVENT_TOPIC,
};
use chain_eth::erc721::{encode_is_approved_for_all, encode_set_approval_for_all};
use chain_eth::{Address, TransactionRequest, U256};
use eth_rpc::{BlockTag, LogFilter, RpcError, RpcProvider};
use tracing::debug;

use crate::error::WalletError;
use crate::signer::TransactionSigner;

/// Typed ERC-1155 multi-token contract.
#[derive(Debug)]
pub struct Erc1155Token {
    address: Address,
    provider: Arc<RpcProvider>,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl Erc1155Token {
    pub fn new(address: Address, provider: Arc<RpcProvider>) -> Self {
        Self { address, provider, signer: None }
    }

    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read(&self, data: Vec<u8>, use_cache: bool) -> Result<Vec<u8>, RpcError> {
        self.provider.eth_call(&self.address, &data, BlockTag::Latest, use_cache).await
    }

    pub async fn balance_of(&self, owner: &Address, id: U256) -> Result<U256, WalletError> {
        let data = self.read(erc1155::encode_balance_of(owner, id), false).await?;
        Ok(decode_uint256(&data)?)
    }

    /// One balance per `(owners[i], ids[i])` pair, in order.
    pub async fn balance_of_batch(&self, owners: &[Address], ids: &[U256]) -> Result<Vec<U256>, WalletError> {
        let call = erc1155::encode_balance_of_batch(owners, ids)?;
        let balances = decode_uint256_array(&self.read(call, false).await?)?;
        if balances.len() != owners.len() {
            return Err(WalletError::InvalidArgument(format!(
                "balanceOfBatch returned {} balances for {} queries",
                balances.len(),
                owners.len()
            )));
        }
        Ok(balances)
    }

    /// Metadata URI for `id` with the `{id}` placeholder filled in.
    pub async fn uri(&self, id: U256) -> Result<String, WalletError> {
        let data = self.read(erc1155::encode_uri(id), true).await?;
        Ok(substitute_uri_id(&decode_string(&data)?, id))
    }

    pub async fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> Result<bool, WalletError> {
        let data = self.read(encode_is_approved_for_all(owner, operator), false).await?;
        Ok(decode_bool(&data)?)
    }

    pub async fn set_approval_for_all(&self, operator: &Address, approved: bool) -> Result<String, WalletError> {
        let (signer, from) = self.signer()?;
        self.submit(signer, from, encode_set_approval_for_all(operator, approved)).await
    }

    pub async fn safe_transfer_from(
        &self,
        from: &Address,
        to: &Address,
        id: U256,
        amount: U256,
        data: &[u8],
    ) -> Result<String, WalletError> {
        let (signer, sender) = self.signer()?;
        let available = self.balance_of(from, id).await?;
        if available < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available,
                decimals: 0,
                symbol: format!("of token #{id}"),
            });
        }
        self.submit(signer, sender, erc1155::encode_safe_transfer_from(from, to, id, amount, data)).await
    }

    pub async fn safe_batch_transfer_from(
        &self,
        from: &Address,
        to: &Address,
        ids: &[U256],
        amounts: &[U256],
        data: &[u8],
    ) -> Result<String, WalletError> {
        let (signer, sender) = self.signer()?;
        let call = erc1155::encode_safe_batch_transfer_from(from, to, ids, amounts, data)?;
        self.submit(signer, sender, call).await
    }

    pub async fn get_transfer_single_events(
        &self,
        operator: Option<&Address>,
        from: Option<&Address>,
        to: Option<&Address>,
        from_block: BlockTag,
        to_block: BlockTag,
    ) -> Result<Vec<TransferSingleEvent>, WalletError> {
        let filter = LogFilter::new(self.address)
            .topics(erc1155::transfer_topics(TRANSFER_SINGLE_EVENT_TOPIC, operator, from, to))
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.provider.get_logs(&filter).await?;
        logs.iter()
            .map(|log| erc1155::decode_transfer_single_log(log).map_err(WalletError::from))
            .collect()
    }

    pub async fn get_transfer_batch_events(
        &self,
        operator: Option<&Address>,
        from: Option<&Address>,
        to: Option<&Address>,
        from_block: BlockTag,
        to_block: BlockTag,
    ) -> Result<Vec<TransferBatchEvent>, WalletError> {
        let filter = LogFilter::new(self.address)
            .topics(erc1155::transfer_topics(TRANSFER_BATCH_EVENT_TOPIC, operator, from, to))
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.provider.get_logs(&filter).await?;
        logs.iter()
            .map(|log| erc1155::decode_transfer_batch_log(log).map_err(WalletError::from))
            .collect()
    }

    fn signer(&self) -> Result<(&Arc<dyn TransactionSigner>, Address), WalletError> {
        let signer = self.signer.as_ref().ok_or(WalletError::NotConnected)?;
        let from = signer.address().ok_or(WalletError::NotConnected)?;
        Ok((signer, from))
    }

    async fn submit(
        &self,
        signer: &Arc<dyn TransactionSigner>,
        from: Address,
        data: Vec<u8>,
    ) -> Result<String, WalletError> {
        let tx = TransactionRequest::contract_call(self.address, data)
            .with_from(from)
            .with_chain_id(self.provider.chain_id());
        let hash = signer.send_transaction(&tx).await?;
        debug!(contract = %self.address, hash = %hash, "multi-token transaction submitted");
        Ok(hash)
    }
}
