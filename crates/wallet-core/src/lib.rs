//! Typed contract access and transaction flow on top of `eth-rpc` and
//! `wallet-connect`.
//!
//! [`WalletCore`] is the entry point a host application holds on to: it
//! owns the chain and token tables, one [`RpcProvider`] per chain and the
//! single [`WalletConnection`], and hands out token, aggregator and
//! lifecycle objects bound to them.

pub mod config;
pub mod erc1155;
pub mod erc20;
pub mod erc721;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod multicall;
pub mod signer;
pub mod watch;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use chain_eth::{Address, ChainRegistry, TokenRegistry};
use dashmap::DashMap;
use eth_rpc::RpcProvider;
use tracing::{debug, info};
use wallet_connect::{DeepLinkLauncher, SessionStore, WalletConnection, WalletInfo, WalletSession};

pub use config::CoreConfig;
pub use erc1155::Erc1155Token;
pub use erc20::Erc20Token;
pub use erc721::Erc721Token;
pub use error::WalletError;
pub use lifecycle::{GasEstimate, LifecycleConfig, TransactionLifecycle};
pub use logging::init_logging;
pub use multicall::CallAggregator;
pub use signer::TransactionSigner;
pub use watch::{watch_balance, BalanceWatch, WatchTarget};

#[derive(Debug)]
pub struct WalletCore {
    config: CoreConfig,
    chains: ChainRegistry,
    tokens: TokenRegistry,
    providers: DashMap<u64, Arc<RpcProvider>>,
    connection: Arc<WalletConnection>,
}

impl WalletCore {
    pub fn new(
        config: CoreConfig,
        wallet: WalletInfo,
        launcher: Arc<dyn DeepLinkLauncher>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, WalletError> {
        let chains = config.chain_registry()?;
        let tokens = config.token_registry()?;
        let connection = Arc::new(WalletConnection::new(wallet, launcher, store, config.connection_config()));
        info!(chains = chains.len(), wallet = %connection.wallet().id, "wallet core ready");
        Ok(Self { config, chains, tokens, providers: DashMap::new(), connection })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn connection(&self) -> &Arc<WalletConnection> {
        &self.connection
    }

    fn signer(&self) -> Arc<dyn TransactionSigner> {
        self.connection.clone()
    }

    // ─── Providers ───────────────────────────────────────────────────────

    /// Shared provider for `chain_id`, built from the chain table on first use.
    pub fn provider(&self, chain_id: u64) -> Result<Arc<RpcProvider>, WalletError> {
        if let Some(provider) = self.providers.get(&chain_id) {
            return Ok(provider.clone());
        }
        let chain = self.chains.require(chain_id)?;
        let provider = self
            .providers
            .entry(chain_id)
            .or_insert_with(|| {
                debug!(chain_id, endpoints = chain.rpc_urls().len(), "creating rpc provider");
                Arc::new(RpcProvider::new(chain).with_timeout(self.config.rpc_timeout()))
            })
            .clone();
        Ok(provider)
    }

    /// Replaces the provider for its chain, e.g. one over WebSocket transports.
    pub fn set_provider(&self, provider: Arc<RpcProvider>) {
        self.providers.insert(provider.chain_id(), provider);
    }

    // ─── Contracts ───────────────────────────────────────────────────────

    /// ERC-20 handle; metadata of listed tokens is served without an RPC.
    pub fn erc20(&self, chain_id: u64, address: Address) -> Result<Erc20Token, WalletError> {
        let mut token = Erc20Token::new(address, self.provider(chain_id)?).with_signer(self.signer());
        if let Some(metadata) = self.tokens.get(chain_id, &address) {
            token = token.with_metadata(metadata);
        }
        Ok(token)
    }

    pub fn erc721(&self, chain_id: u64, address: Address) -> Result<Erc721Token, WalletError> {
        Ok(Erc721Token::new(address, self.provider(chain_id)?).with_signer(self.signer()))
    }

    pub fn erc1155(&self, chain_id: u64, address: Address) -> Result<Erc1155Token, WalletError> {
        Ok(Erc1155Token::new(address, self.provider(chain_id)?).with_signer(self.signer()))
    }

    pub fn aggregator(&self, chain_id: u64) -> Result<CallAggregator, WalletError> {
        Ok(CallAggregator::new(self.provider(chain_id)?))
    }

    pub fn lifecycle(&self, chain_id: u64) -> Result<TransactionLifecycle, WalletError> {
        Ok(TransactionLifecycle::new(self.provider(chain_id)?, self.signer(), self.config.lifecycle_config()))
    }

    /// Balances of every listed token on `chain_id` in one batched call,
    /// paired with their metadata.
    pub async fn portfolio(
        &self,
        chain_id: u64,
        owner: &Address,
    ) -> Result<Vec<(chain_eth::TokenMetadata, Option<chain_eth::U256>)>, WalletError> {
        let listed = self.tokens.tokens(chain_id);
        let addresses: Vec<Address> = listed.iter().map(|t| t.address).collect();
        let balances = self.aggregator(chain_id)?.token_balances(owner, &addresses).await?;
        Ok(listed.iter().cloned().zip(balances).collect())
    }

    /// Background balance poll on `chain_id`; `interval` must be non-zero.
    pub fn watch_balance(
        &self,
        chain_id: u64,
        owner: Address,
        target: WatchTarget,
        interval: Duration,
    ) -> Result<BalanceWatch, WalletError> {
        watch::watch_balance(self.provider(chain_id)?, owner, target, interval)
    }

    // ─── Wallet session ──────────────────────────────────────────────────

    pub fn restore_session(&self) -> Result<Option<WalletSession>, WalletError> {
        Ok(self.connection.restore()?)
    }

    /// Pairs with the wallet on `chain_id`, which must be in the chain table.
    pub async fn connect(&self, chain_id: u64) -> Result<WalletSession, WalletError> {
        self.chains.require(chain_id)?;
        Ok(self.connection.connect(chain_id).await?)
    }

    pub async fn switch_chain(&self, chain_id: u64) -> Result<WalletSession, WalletError> {
        self.chains.require(chain_id)?;
        Ok(self.connection.switch_chain(chain_id).await?)
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// Forwards an inbound deep link; `true` if it answered a pending request.
    pub fn handle_callback(&self, uri: &str) -> bool {
        self.connection.handle_callback(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{addr, mock_provider, word, NotInstalled};
    use chain_eth::{EthError, U256};
    use serde_json::json;
    use wallet_connect::{ConnectError, ConnectionState, MemorySessionStore};

    fn core() -> WalletCore {
        WalletCore::new(
            CoreConfig::default(),
            WalletInfo::metamask(),
            Arc::new(NotInstalled),
            Arc::new(MemorySessionStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn providers_are_shared_per_chain() {
        let core = core();
        let a = core.provider(1).unwrap();
        let b = core.provider(1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.chain_id(), 1);
        assert!(matches!(core.provider(999_999), Err(WalletError::Eth(EthError::UnsupportedChain(999_999)))));
    }

    #[tokio::test]
    async fn listed_token_metadata_skips_rpc() {
        let core = core();
        let (provider, rpc) = mock_provider(1, |_, _| panic!("metadata should be prefilled"));
        core.set_provider(provider);
        let usdc = Address::parse("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap();
        let token = core.erc20(1, usdc).unwrap();
        assert_eq!(token.decimals().await.unwrap(), 6);
        assert_eq!(token.symbol().await.unwrap(), "USDC");
        assert!(rpc.calls().is_empty());
    }

    #[tokio::test]
    async fn connect_checks_chain_table_first() {
        let core = core();
        let err = core.connect(424_242).await.unwrap_err();
        assert!(matches!(err, WalletError::Eth(EthError::UnsupportedChain(_))));
        assert_eq!(core.connection().state(), ConnectionState::Disconnected);

        let err = core.connect(1).await.unwrap_err();
        assert!(matches!(err, WalletError::Connect(ConnectError::WalletNotInstalled { .. })));
    }

    #[tokio::test]
    async fn writes_need_a_session() {
        let core = core();
        let (provider, _) = mock_provider(1, |_, _| Ok(word(U256::from(1u64))));
        core.set_provider(provider);
        let token = core.erc20(1, addr(0xaa)).unwrap();
        assert!(matches!(token.approve(&addr(2), U256::from(1u64)).await, Err(WalletError::NotConnected)));
        let lifecycle = core.lifecycle(1).unwrap();
        let tx = chain_eth::TransactionRequest::native_transfer(addr(2), U256::ZERO);
        assert!(matches!(lifecycle.send(&tx).await, Err(WalletError::NotConnected)));
    }

    #[tokio::test]
    async fn portfolio_pairs_balances_with_metadata() {
        let core = core();
        let listed = core.tokens().tokens(1).len();
        assert!(listed > 0);
        let (provider, rpc) = mock_provider(1, move |_, _| {
            let items = (0..listed)
                .map(|_| {
                    chain_eth::abi::AbiValue::Tuple(vec![
                        chain_eth::abi::AbiValue::Bool(true),
                        chain_eth::abi::AbiValue::Bytes(chain_eth::abi::encode_uint256(U256::from(42u64)).to_vec()),
                    ])
                })
                .collect();
            Ok(json!(chain_eth::abi::encode_hex(&chain_eth::abi::encode_params(&[
                chain_eth::abi::AbiValue::Array(items)
            ]))))
        });
        core.set_provider(provider);
        let portfolio = core.portfolio(1, &addr(1)).await.unwrap();
        assert_eq!(portfolio.len(), listed);
        assert!(portfolio.iter().all(|(_, balance)| *balance == Some(U256::from(42u64))));
        assert_eq!(rpc.count("eth_call"), 1);
    }

    #[tokio::test]
    async fn zero_watch_interval_fails_up_front() {
        let core = core();
        let (provider, _) = mock_provider(1, |_, _| Ok(json!("0x1")));
        core.set_provider(provider);
        let err = core.watch_balance(1, addr(1), WatchTarget::Native, Duration::ZERO).unwrap_err();
        assert!(matches!(err, WalletError::InvalidArgument(_)));

        let watch = core.watch_balance(1, addr(1), WatchTarget::Native, Duration::from_secs(1));
        assert!(watch.is_ok());
    }
}
