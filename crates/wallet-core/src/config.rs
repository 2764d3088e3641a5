use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chain_eth::{Chain, ChainRegistry, TokenMetadata, TokenRegistry};
use serde::{Deserialize, Serialize};
use wallet_connect::ConnectionConfig;

use crate::error::WalletError;
use crate::lifecycle::LifecycleConfig;

/// Runtime configuration, loaded from JSON. Every field has a default, so
/// `{}` is a valid document.
///
/// `chains` and `tokens` are merged on top of the built-in tables; an entry
/// with a known chain id or token address replaces the built-in one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub rpc_timeout_ms: u64,
    pub wallet_request_timeout_secs: u64,
    pub callback_uri: String,
    pub app_name: String,
    pub session_ttl_secs: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_max_wait_secs: u64,
    pub gas_buffer_percent: u64,
    pub chains: Vec<Chain>,
    pub tokens: BTreeMap<u64, Vec<TokenMetadata>>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 15_000,
            wallet_request_timeout_secs: 120,
            callback_uri: "evmcore://wallet/callback".into(),
            app_name: "evmcore".into(),
            session_ttl_secs: 7 * 24 * 60 * 60,
            receipt_poll_interval_ms: 2_000,
            receipt_max_wait_secs: 120,
            gas_buffer_percent: 20,
            chains: Vec::new(),
            tokens: BTreeMap::new(),
        }
    }
}

impl CoreConfig {
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| WalletError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), WalletError> {
        if self.receipt_poll_interval_ms == 0 {
            return Err(WalletError::Config("receiptPollIntervalMs must be positive".into()));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(WalletError::Config("rpcTimeoutMs must be positive".into()));
        }
        if !self.callback_uri.contains("://") {
            return Err(WalletError::Config(format!("callbackUri is not a URI: {}", self.callback_uri)));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn chain_registry(&self) -> Result<ChainRegistry, WalletError> {
        let mut registry = ChainRegistry::builtin()?;
        registry.extend(ChainRegistry::new(self.chains.clone()));
        Ok(registry)
    }

    pub fn token_registry(&self) -> Result<TokenRegistry, WalletError> {
        let mut registry = TokenRegistry::builtin()?;
        for (chain_id, tokens) in &self.tokens {
            for token in tokens {
                registry.insert(*chain_id, token.clone());
            }
        }
        Ok(registry)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            app_name: self.app_name.clone(),
            callback_uri: self.callback_uri.clone(),
            request_timeout: Duration::from_secs(self.wallet_request_timeout_secs),
            session_ttl: Duration::from_secs(self.session_ttl_secs),
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            max_wait: Duration::from_secs(self.receipt_max_wait_secs),
            gas_buffer_percent: self.gas_buffer_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_eth::Address;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_json("{}").unwrap();
        assert_eq!(config.rpc_timeout(), Duration::from_secs(15));
        assert_eq!(config.connection_config(), ConnectionConfig::default());
        assert_eq!(config.lifecycle_config(), LifecycleConfig::default());
    }

    #[test]
    fn custom_chain_overrides_builtin() {
        let config = CoreConfig::from_json(
            r#"{
                "rpcTimeoutMs": 5000,
                "chains": [
                    { "chainId": 1, "name": "Ethereum", "rpcUrl": "https://rpc.internal/eth", "nativeSymbol": "ETH" },
                    { "chainId": 31337, "name": "Anvil", "rpcUrl": "http://127.0.0.1:8545", "nativeSymbol": "ETH", "isTestnet": true }
                ]
            }"#,
        )
        .unwrap();
        let registry = config.chain_registry().unwrap();
        assert_eq!(registry.get(1).unwrap().rpc_url, "https://rpc.internal/eth");
        assert!(registry.get(31337).unwrap().is_testnet);
        assert!(registry.get(137).is_some());
        assert_eq!(config.rpc_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn tokens_merge_into_registry() {
        let config = CoreConfig::from_json(
            r#"{
                "tokens": {
                    "31337": [
                        { "address": "0x5FbDB2315678afecb367f032d93F642f64180aa3", "name": "Test", "symbol": "TST", "decimals": 6 }
                    ]
                }
            }"#,
        )
        .unwrap();
        let registry = config.token_registry().unwrap();
        let address = Address::parse("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
        assert_eq!(registry.get(31337, &address).unwrap().decimals, 6);
        assert!(!registry.tokens(1).is_empty());
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(CoreConfig::from_json("[]"), Err(WalletError::Config(_))));
        assert!(matches!(
            CoreConfig::from_json(r#"{"receiptPollIntervalMs": 0}"#),
            Err(WalletError::Config(_))
        ));
        assert!(matches!(
            CoreConfig::from_json(r#"{"callbackUri": "nope"}"#),
            Err(WalletError::Config(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.json");
        std::fs::write(&path, r#"{"appName": "Portfolio", "gasBufferPercent": 50}"#).unwrap();
        let config = CoreConfig::from_path(&path).unwrap();
        assert_eq!(config.connection_config().app_name, "Portfolio");
        assert_eq!(config.lifecycle_config().gas_buffer_percent, 50);

        assert!(matches!(CoreConfig::from_path(dir.path().join("missing.json")), Err(WalletError::Config(_))));
    }
}
