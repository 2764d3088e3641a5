//! Typed ERC-20 contract bound to a provider and, for writes, a signer.

use std::sync::Arc;

use chain_eth::decode::{decode_string_or_bytes32, decode_uint256};
use chain_eth::erc20::{self, ApprovalEvent, TransferEvent};
use chain_eth::units::{self, MAX_UINT256};
use chain_eth::{Address, TokenMetadata, TransactionRequest, U256};
use eth_rpc::{BlockTag, LogFilter, RpcError, RpcProvider};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::WalletError;
use crate::signer::TransactionSigner;

/// Used when a legacy token has no `decimals()`.
pub const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug)]
pub struct Erc20Token {
    address: Address,
    provider: Arc<RpcProvider>,
    signer: Option<Arc<dyn TransactionSigner>>,
    name: OnceCell<String>,
    symbol: OnceCell<String>,
    decimals: OnceCell<u8>,
}

impl Erc20Token {
    pub fn new(address: Address, provider: Arc<RpcProvider>) -> Self {
        Self {
            address,
            provider,
            signer: None,
            name: OnceCell::new(),
            symbol: OnceCell::new(),
            decimals: OnceCell::new(),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Seed the metadata cache, e.g. from a token registry entry.
    pub fn with_metadata(self, metadata: &TokenMetadata) -> Self {
        let _ = self.name.set(metadata.name.clone());
        let _ = self.symbol.set(metadata.symbol.clone());
        let _ = self.decimals.set(metadata.decimals);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.provider.chain_id()
    }

    async fn read(&self, data: Vec<u8>, use_cache: bool) -> Result<Vec<u8>, RpcError> {
        self.provider.eth_call(&self.address, &data, BlockTag::Latest, use_cache).await
    }

    pub async fn name(&self) -> Result<String, WalletError> {
        self.name
            .get_or_try_init(|| async {
                let data = self.read(erc20::encode_name(), true).await?;
                Ok::<_, WalletError>(decode_string_or_bytes32(&data)?)
            })
            .await
            .cloned()
    }

    pub async fn symbol(&self) -> Result<String, WalletError> {
        self.symbol
            .get_or_try_init(|| async {
                let data = self.read(erc20::encode_symbol(), true).await?;
                Ok::<_, WalletError>(decode_string_or_bytes32(&data)?)
            })
            .await
            .cloned()
    }

    /// Token decimals. A reverting or empty `decimals()` yields
    /// [`DEFAULT_DECIMALS`]; that fallback is not cached.
    pub async fn decimals(&self) -> Result<u8, WalletError> {
        if let Some(decimals) = self.decimals.get() {
            return Ok(*decimals);
        }
        let data = match self.read(erc20::encode_decimals(), true).await {
            Ok(data) => data,
            Err(e) if e.is_revert() => {
                warn!(token = %self.address, error = %e, "decimals() reverted, assuming 18");
                return Ok(DEFAULT_DECIMALS);
            }
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            warn!(token = %self.address, "decimals() returned no data, assuming 18");
            return Ok(DEFAULT_DECIMALS);
        }
        let decimals = u8::try_from(decode_uint256(&data)?)
            .map_err(|_| WalletError::InvalidArgument(format!("{} reports decimals > 255", self.address)))?;
        let _ = self.decimals.set(decimals);
        Ok(decimals)
    }

    pub async fn total_supply(&self) -> Result<U256, WalletError> {
        let data = self.read(erc20::encode_total_supply(), false).await?;
        Ok(decode_uint256(&data)?)
    }

    pub async fn balance_of(&self, owner: &Address) -> Result<U256, WalletError> {
        let data = self.read(erc20::encode_balance_of(owner), false).await?;
        Ok(decode_uint256(&data)?)
    }

    pub async fn allowance(&self, owner: &Address, spender: &Address) -> Result<U256, WalletError> {
        let data = self.read(erc20::encode_allowance(owner, spender), false).await?;
        Ok(decode_uint256(&data)?)
    }

    pub async fn metadata(&self) -> Result<TokenMetadata, WalletError> {
        Ok(TokenMetadata {
            address: self.address,
            name: self.name().await?,
            symbol: self.symbol().await?,
            decimals: self.decimals().await?,
            total_supply: Some(self.total_supply().await?),
        })
    }

    /// Transfer `amount` raw units to `to`.
    ///
    /// The sender's balance is checked first so a doomed transfer never
    /// reaches the wallet.
    pub async fn transfer(&self, to: &Address, amount: U256) -> Result<String, WalletError> {
        let (signer, from) = self.signer()?;
        let available = self.balance_of(&from).await?;
        if available < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available,
                decimals: self.decimals().await?,
                symbol: self.symbol_or_address().await,
            });
        }
        self.submit(signer, from, erc20::encode_transfer(to, amount)).await
    }

    pub async fn approve(&self, spender: &Address, amount: U256) -> Result<String, WalletError> {
        let (signer, from) = self.signer()?;
        self.submit(signer, from, erc20::encode_approve(spender, amount)).await
    }

    /// Spend `amount` of `from`'s tokens under an allowance granted to the
    /// connected account.
    pub async fn transfer_from(&self, from: &Address, to: &Address, amount: U256) -> Result<String, WalletError> {
        let (signer, spender) = self.signer()?;
        let available = self.allowance(from, &spender).await?;
        if available < amount {
            return Err(WalletError::InsufficientAllowance {
                required: amount,
                available,
                decimals: self.decimals().await?,
                symbol: self.symbol_or_address().await,
            });
        }
        self.submit(signer, spender, erc20::encode_transfer_from(from, to, amount)).await
    }

    /// Approve `spender` for at least `amount` unless it already is.
    ///
    /// Returns `None` when the current allowance suffices, otherwise the
    /// hash of the single `approve` sent (for `amount`, or for the maximum
    /// uint256 with `use_infinite`). The approval is not awaited.
    pub async fn ensure_approval(
        &self,
        spender: &Address,
        amount: U256,
        use_infinite: bool,
    ) -> Result<Option<String>, WalletError> {
        let (_, owner) = self.signer()?;
        let current = self.allowance(&owner, spender).await?;
        if current >= amount {
            debug!(token = %self.address, spender = %spender, "allowance already sufficient");
            return Ok(None);
        }
        let value = if use_infinite { MAX_UINT256 } else { amount };
        self.approve(spender, value).await.map(Some)
    }

    pub async fn get_transfer_events(
        &self,
        from: Option<&Address>,
        to: Option<&Address>,
        from_block: BlockTag,
        to_block: BlockTag,
    ) -> Result<Vec<TransferEvent>, WalletError> {
        let filter = LogFilter::new(self.address)
            .topics(erc20::transfer_topics(from, to))
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.provider.get_logs(&filter).await?;
        logs.iter()
            .map(|log| erc20::decode_transfer_log(log).map_err(WalletError::from))
            .collect()
    }

    pub async fn get_approval_events(
        &self,
        owner: Option<&Address>,
        from_block: BlockTag,
        to_block: BlockTag,
    ) -> Result<Vec<ApprovalEvent>, WalletError> {
        let filter = LogFilter::new(self.address)
            .topics(vec![Some(erc20::APPROVAL_EVENT_TOPIC), owner.map(chain_eth::log::address_topic)])
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.provider.get_logs(&filter).await?;
        logs.iter()
            .map(|log| erc20::decode_approval_log(log).map_err(WalletError::from))
            .collect()
    }

    pub async fn format_amount(&self, raw: U256, display_decimals: Option<u8>) -> Result<String, WalletError> {
        Ok(units::format_amount(raw, self.decimals().await?, display_decimals))
    }

    pub async fn parse_amount(&self, input: &str) -> Result<U256, WalletError> {
        Ok(units::parse_amount(input, self.decimals().await?)?)
    }

    fn signer(&self) -> Result<(&Arc<dyn TransactionSigner>, Address), WalletError> {
        let signer = self.signer.as_ref().ok_or(WalletError::NotConnected)?;
        let from = signer.address().ok_or(WalletError::NotConnected)?;
        Ok((signer, from))
    }

    async fn symbol_or_address(&self) -> String {
        self.symbol().await.unwrap_or_else(|_| self.address.to_string())
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
        debug!(token = %self.address, hash = %hash, "token transaction submitted");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{addr, call_data, mock_provider, revert, selector, word, MockSigner};
    use chain_eth::abi::{encode_hex, encode_params, AbiValue};
    use chain_eth::decode::decode_params;
    use chain_eth::abi::AbiType;
    use serde_json::{json, Value};

    const TOKEN: u8 = 0xaa;

    fn string_return(s: &str) -> Value {
        json!(encode_hex(&encode_params(&[AbiValue::String(s.into())])))
    }

    /// balance 1000, allowance 500, 6 decimals
    fn usdc_like(method: &str, params: &Value) -> Result<Value, RpcError> {
        assert_eq!(method, "eth_call");
        match selector(params) {
            erc20::NAME_SELECTOR => Ok(string_return("USD Coin")),
            erc20::SYMBOL_SELECTOR => Ok(string_return("USDC")),
            erc20::DECIMALS_SELECTOR => Ok(word(U256::from(6u64))),
            erc20::TOTAL_SUPPLY_SELECTOR => Ok(word(U256::from(1_000_000u64))),
            erc20::BALANCE_OF_SELECTOR => Ok(word(U256::from(1000u64))),
            erc20::ALLOWANCE_SELECTOR => Ok(word(U256::from(500u64))),
            other => panic!("unexpected selector {other:?}"),
        }
    }

    fn token_with(signer: Arc<MockSigner>) -> (Erc20Token, Arc<crate::test_support::MockRpc>) {
        let (provider, rpc) = mock_provider(1, usdc_like);
        (Erc20Token::new(addr(TOKEN), provider).with_signer(signer), rpc)
    }

    #[tokio::test]
    async fn metadata_is_fetched_once() {
        let (provider, rpc) = mock_provider(1, usdc_like);
        let token = Erc20Token::new(addr(TOKEN), provider);

        assert_eq!(token.name().await.unwrap(), "USD Coin");
        assert_eq!(token.symbol().await.unwrap(), "USDC");
        assert_eq!(token.decimals().await.unwrap(), 6);
        assert_eq!(token.symbol().await.unwrap(), "USDC");
        assert_eq!(token.decimals().await.unwrap(), 6);
        assert_eq!(rpc.count("eth_call"), 3);

        let meta = token.metadata().await.unwrap();
        assert_eq!(meta.total_supply, Some(U256::from(1_000_000u64)));
        assert_eq!(rpc.count("eth_call"), 4);
    }

    #[tokio::test]
    async fn balances_bypass_cache() {
        let (provider, rpc) = mock_provider(1, usdc_like);
        let token = Erc20Token::new(addr(TOKEN), provider);
        token.balance_of(&addr(1)).await.unwrap();
        token.balance_of(&addr(1)).await.unwrap();
        assert_eq!(rpc.count("eth_call"), 2);
    }

    #[tokio::test]
    async fn reverting_decimals_defaults_to_18() {
        let (provider, rpc) = mock_provider(1, |_, params| match selector(params) {
            erc20::DECIMALS_SELECTOR => Err(revert()),
            _ => Ok(word(U256::ZERO)),
        });
        let token = Erc20Token::new(addr(TOKEN), provider);
        assert_eq!(token.decimals().await.unwrap(), 18);
        assert_eq!(token.decimals().await.unwrap(), 18);
        // fallback not cached: asked twice
        assert_eq!(rpc.count("eth_call"), 2);
    }

    #[tokio::test]
    async fn bytes32_symbol_is_decoded() {
        let (provider, _) = mock_provider(1, |_, _| {
            let mut word = [0u8; 32];
            word[..3].copy_from_slice(b"MKR");
            Ok(json!(encode_hex(&word)))
        });
        let token = Erc20Token::new(addr(TOKEN), provider);
        assert_eq!(token.symbol().await.unwrap(), "MKR");
    }

    #[tokio::test]
    async fn writes_need_a_signer() {
        let (provider, _) = mock_provider(1, usdc_like);
        let token = Erc20Token::new(addr(TOKEN), provider);
        assert!(matches!(token.approve(&addr(2), U256::from(1u64)).await, Err(WalletError::NotConnected)));

        let (token, _) = token_with(MockSigner::disconnected());
        assert!(matches!(token.transfer(&addr(2), U256::from(1u64)).await, Err(WalletError::NotConnected)));
    }

    #[tokio::test]
    async fn transfer_checks_balance_first() {
        let signer = MockSigner::connected(addr(1), 1);
        let (token, _) = token_with(signer.clone());

        let err = token.transfer(&addr(2), U256::from(1001u64)).await.unwrap_err();
        match err {
            WalletError::InsufficientBalance { required, available, decimals, symbol } => {
                assert_eq!(required, U256::from(1001u64));
                assert_eq!(available, U256::from(1000u64));
                assert_eq!(decimals, 6);
                assert_eq!(symbol, "USDC");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(signer.sent().is_empty());

        let hash = token.transfer(&addr(2), U256::from(1000u64)).await.unwrap();
        assert_eq!(hash.len(), 66);
        let sent = signer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, addr(TOKEN));
        assert_eq!(sent[0].from, Some(addr(1)));
        assert_eq!(sent[0].chain_id, Some(1));
        assert_eq!(sent[0].data, erc20::encode_transfer(&addr(2), U256::from(1000u64)));
    }

    #[tokio::test]
    async fn transfer_from_checks_allowance() {
        let signer = MockSigner::connected(addr(1), 1);
        let (token, _) = token_with(signer.clone());
        let err = token.transfer_from(&addr(3), &addr(2), U256::from(501u64)).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientAllowance { .. }));
        token.transfer_from(&addr(3), &addr(2), U256::from(500u64)).await.unwrap();
        assert_eq!(signer.sent().len(), 1);
    }

    #[tokio::test]
    async fn ensure_approval_skips_when_sufficient() {
        for use_infinite in [false, true] {
            let signer = MockSigner::connected(addr(1), 1);
            let (token, _) = token_with(signer.clone());
            let result = token.ensure_approval(&addr(9), U256::from(500u64), use_infinite).await.unwrap();
            assert_eq!(result, None);
            assert!(signer.sent().is_empty());
        }
    }

    #[tokio::test]
    async fn ensure_approval_sends_exactly_one_approve() {
        for (use_infinite, expected) in [(false, U256::from(501u64)), (true, MAX_UINT256)] {
            let signer = MockSigner::connected(addr(1), 1);
            let (token, _) = token_with(signer.clone());
            let hash = token.ensure_approval(&addr(9), U256::from(501u64), use_infinite).await.unwrap();
            assert!(hash.is_some());

            let sent = signer.sent();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].data, erc20::encode_approve(&addr(9), expected));
        }
    }

    #[tokio::test]
    async fn transfer_events_filter_and_decode() {
        let (provider, rpc) = mock_provider(1, |method, params| {
            assert_eq!(method, "eth_getLogs");
            let filter = &params[0];
            assert_eq!(filter["topics"].as_array().unwrap().len(), 3);
            assert!(filter["topics"][1].is_null());
            Ok(json!([{
                "address": addr(TOKEN).to_string(),
                "topics": [
                    encode_hex(&erc20::TRANSFER_EVENT_TOPIC),
                    encode_hex(&chain_eth::log::address_topic(&addr(1))),
                    encode_hex(&chain_eth::log::address_topic(&addr(2))),
                ],
                "data": word(U256::from(42u64)),
                "blockNumber": "0x10",
                "transactionHash": format!("0x{}", "ab".repeat(32)),
                "logIndex": "0x0",
            }]))
        });
        let token = Erc20Token::new(addr(TOKEN), provider);
        let events = token
            .get_transfer_events(None, Some(&addr(2)), BlockTag::Number(1), BlockTag::Latest)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from, addr(1));
        assert_eq!(events[0].value, U256::from(42u64));
        assert_eq!(events[0].block_number, Some(16));
        assert_eq!(rpc.calls()[0].1[0]["fromBlock"], "0x1");
    }

    #[tokio::test]
    async fn amounts_use_token_decimals() {
        let (provider, _) = mock_provider(1, usdc_like);
        let token = Erc20Token::new(addr(TOKEN), provider);
        assert_eq!(token.format_amount(U256::from(1_234_567u64), Some(2)).await.unwrap(), "1.23");
        assert_eq!(token.parse_amount("1.2345678").await.unwrap(), U256::from(1_234_567u64));
        assert!(matches!(token.parse_amount("abc").await, Err(WalletError::Eth(_))));
    }

    #[tokio::test]
    async fn registry_metadata_skips_rpc() {
        let (provider, rpc) = mock_provider(1, usdc_like);
        let meta = TokenMetadata {
            address: addr(TOKEN),
            name: "USD Coin".into(),
            symbol: "USDC".into(),
            decimals: 6,
            total_supply: None,
        };
        let token = Erc20Token::new(addr(TOKEN), provider).with_metadata(&meta);
        assert_eq!(token.decimals().await.unwrap(), 6);
        assert_eq!(token.symbol().await.unwrap(), "USDC");
        assert_eq!(rpc.count("eth_call"), 0);
    }

    #[test]
    fn approve_calldata_decodes() {
        let data = erc20::encode_approve(&addr(9), MAX_UINT256);
        let decoded = decode_params(&[AbiType::Address, AbiType::Uint], &data[4..]).unwrap();
        assert_eq!(decoded[1].as_uint(), Some(MAX_UINT256));
        assert!(!call_data(&json!([{"data": encode_hex(&data)}])).is_empty());
    }
}
