use std::sync::Arc;

use chain_eth::decode::{decode_address, decode_bool, decode_string, decode_string_or_bytes32, decode_uint256};
use chain_eth::erc721::{self, NftTransferEvent, ERC721_INTERFACE_ID};
use chain_eth::{Address, TransactionRequest, U256};
use eth_rpc::{BlockTag, LogFilter, RpcError, RpcProvider};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::WalletError;
use crate::signer::TransactionSigner;

/// Typed ERC-721 collection.
#[derive(Debug)]
pub struct Erc721Token {
    address: Address,
    provider: Arc<RpcProvider>,
    signer: Option<Arc<dyn TransactionSigner>>,
    name: OnceCell<String>,
    symbol: OnceCell<String>,
}

impl Erc721Token {
    pub fn new(address: Address, provider: Arc<RpcProvider>) -> Self {
        Self { address, provider, signer: None, name: OnceCell::new(), symbol: OnceCell::new() }
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

    pub async fn name(&self) -> Result<String, WalletError> {
        self.name
            .get_or_try_init(|| async {
                let data = self.read(chain_eth::erc20::encode_name(), true).await?;
                Ok::<_, WalletError>(decode_string_or_bytes32(&data)?)
            })
            .await
            .cloned()
    }

    pub async fn symbol(&self) -> Result<String, WalletError> {
        self.symbol
            .get_or_try_init(|| async {
                let data = self.read(chain_eth::erc20::encode_symbol(), true).await?;
                Ok::<_, WalletError>(decode_string_or_bytes32(&data)?)
            })
            .await
            .cloned()
    }

    /// ERC-165 `supportsInterface` check. A revert means the contract predates ERC-165.
    pub async fn supports_erc721(&self) -> Result<bool, WalletError> {
        match self.read(erc721::encode_supports_interface(ERC721_INTERFACE_ID), true).await {
            Ok(data) if data.is_empty() => Ok(false),
            Ok(data) => Ok(decode_bool(&data)?),
            Err(e) if e.is_revert() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn balance_of(&self, owner: &Address) -> Result<U256, WalletError> {
        let data = self.read(erc721::encode_balance_of(owner), false).await?;
        Ok(decode_uint256(&data)?)
    }

    pub async fn owner_of(&self, token_id: U256) -> Result<Address, WalletError> {
        let data = self.read(erc721::encode_owner_of(token_id), false).await?;
        Ok(decode_address(&data)?)
    }

    pub async fn token_uri(&self, token_id: U256) -> Result<String, WalletError> {
        let data = self.read(erc721::encode_token_uri(token_id), false).await?;
        Ok(decode_string(&data)?)
    }

    pub async fn get_approved(&self, token_id: U256) -> Result<Address, WalletError> {
        let data = self.read(erc721::encode_get_approved(token_id), false).await?;
        Ok(decode_address(&data)?)
    }

    pub async fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> Result<bool, WalletError> {
        let data = self.read(erc721::encode_is_approved_for_all(owner, operator), false).await?;
        Ok(decode_bool(&data)?)
    }

    pub async fn approve(&self, to: &Address, token_id: U256) -> Result<String, WalletError> {
        let (signer, from) = self.signer()?;
        self.submit(signer, from, erc721::encode_approve(to, token_id)).await
    }

    pub async fn set_approval_for_all(&self, operator: &Address, approved: bool) -> Result<String, WalletError> {
        let (signer, from) = self.signer()?;
        self.submit(signer, from, erc721::encode_set_approval_for_all(operator, approved)).await
    }

    pub async fn transfer_from(&self, from: &Address, to: &Address, token_id: U256) -> Result<String, WalletError> {
        let (signer, sender) = self.signer()?;
        self.check_owner(from, token_id).await?;
        self.submit(signer, sender, erc721::encode_transfer_from(from, to, token_id)).await
    }

    /// `safeTransferFrom`, with the `bytes` overload when `data` is given.
    pub async fn safe_transfer_from(
        &self,
        from: &Address,
        to: &Address,
        token_id: U256,
        data: Option<&[u8]>,
    ) -> Result<String, WalletError> {
        let (signer, sender) = self.signer()?;
        self.check_owner(from, token_id).await?;
        self.submit(signer, sender, erc721::encode_safe_transfer_from(from, to, token_id, data)).await
    }

    pub async fn get_transfer_events(
        &self,
        from: Option<&Address>,
        to: Option<&Address>,
        token_id: Option<U256>,
        from_block: BlockTag,
        to_block: BlockTag,
    ) -> Result<Vec<NftTransferEvent>, WalletError> {
        let filter = LogFilter::new(self.address)
            .topics(erc721::transfer_topics(from, to, token_id))
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.provider.get_logs(&filter).await?;
        logs.iter()
            .map(|log| erc721::decode_transfer_log(log).map_err(WalletError::from))
            .collect()
    }

    async fn check_owner(&self, from: &Address, token_id: U256) -> Result<(), WalletError> {
        let owner = self.owner_of(token_id).await?;
        if owner != *from {
            return Err(WalletError::InvalidArgument(format!(
                "token {token_id} is owned by {owner}, not {from}"
            )));
        }
        Ok(())
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
        debug!(collection = %self.address, hash = %hash, "nft transaction submitted");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{addr, mock_provider, revert, selector, word, MockSigner};
    use chain_eth::abi::{encode_address, encode_hex, encode_params, AbiValue};
    use serde_json::json;

    fn collection(method: &str, params: &serde_json::Value) -> Result<serde_json::Value, RpcError> {
        assert_eq!(method, "eth_call");
        match selector(params) {
            erc721::OWNER_OF_SELECTOR => Ok(json!(encode_hex(&encode_address(&addr(1))))),
            erc721::BALANCE_OF_SELECTOR => Ok(word(U256::from(3u64))),
            erc721::TOKEN_URI_SELECTOR => {
                Ok(json!(encode_hex(&encode_params(&[AbiValue::String("ipfs://meta/7".into())]))))
            }
            erc721::IS_APPROVED_FOR_ALL_SELECTOR => Ok(word(U256::from(1u64))),
            erc721::SUPPORTS_INTERFACE_SELECTOR => Ok(word(U256::from(1u64))),
            other => panic!("unexpected selector {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_decode() {
        let (provider, _) = mock_provider(1, collection);
        let nft = Erc721Token::new(addr(0xcc), provider);
        assert_eq!(nft.owner_of(U256::from(7u64)).await.unwrap(), addr(1));
        assert_eq!(nft.balance_of(&addr(1)).await.unwrap(), U256::from(3u64));
        assert_eq!(nft.token_uri(U256::from(7u64)).await.unwrap(), "ipfs://meta/7");
        assert!(nft.is_approved_for_all(&addr(1), &addr(2)).await.unwrap());
        assert!(nft.supports_erc721().await.unwrap());
    }

    #[tokio::test]
    async fn pre_erc165_contract_is_not_erc721() {
        let (provider, _) = mock_provider(1, |_, _| Err(revert()));
        let nft = Erc721Token::new(addr(0xcc), provider);
        assert!(!nft.supports_erc721().await.unwrap());
    }

    #[tokio::test]
    async fn transfer_requires_ownership() {
        let signer = MockSigner::connected(addr(1), 1);
        let (provider, _) = mock_provider(1, collection);
        let nft = Erc721Token::new(addr(0xcc), provider).with_signer(signer.clone());

        let err = nft.transfer_from(&addr(5), &addr(2), U256::from(7u64)).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidArgument(_)));
        assert!(signer.sent().is_empty());

        nft.safe_transfer_from(&addr(1), &addr(2), U256::from(7u64), Some(b"hi")).await.unwrap();
        let sent = signer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data[..4], erc721::SAFE_TRANSFER_FROM_WITH_DATA_SELECTOR);
    }

    #[tokio::test]
    async fn approvals_need_connection() {
        let (provider, _) = mock_provider(1, collection);
        let nft = Erc721Token::new(addr(0xcc), provider).with_signer(MockSigner::disconnected());
        assert!(matches!(nft.set_approval_for_all(&addr(2), true).await, Err(WalletError::NotConnected)));
        assert!(matches!(nft.approve(&addr(2), U256::from(1u64)).await, Err(WalletError::NotConnected)));
    }

    #[tokio::test]
    async fn transfer_events_filter_on_token_id() {
        let (provider, rpc) = mock_provider(1, |_, _| {
            Ok(json!([{
                "address": addr(0xcc).to_string(),
                "topics": [
                    encode_hex(&chain_eth::erc20::TRANSFER_EVENT_TOPIC),
                    encode_hex(&encode_address(&addr(1))),
                    encode_hex(&encode_address(&addr(2))),
                    encode_hex(&U256::from(7u64).to_be_bytes::<32>()),
                ],
                "data": "0x",
            }]))
        });
        let nft = Erc721Token::new(addr(0xcc), provider);
        let events = nft
            .get_transfer_events(None, None, Some(U256::from(7u64)), BlockTag::Earliest, BlockTag::Latest)
            .await
            .unwrap();
        assert_eq!(events[0].token_id, U256::from(7u64));
        assert_eq!(events[0].to, addr(2));

        let topics = rpc.calls()[0].1[0]["topics"].clone();
        assert_eq!(topics.as_array().unwrap().len(), 4);
        assert!(topics[1].is_null() && topics[2].is_null());
    }
}
