//! Wallet families and the payload shapes they speak.
//!
//! Every family offers the same capability set (pair, sign, send, switch
//! chain, disconnect). What differs is data: the deep-link scheme, which
//! chains it can reach and how each request is laid out.

use chain_eth::{Address, TransactionRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ConnectError;

pub const HEDERA_MAINNET_CHAIN_ID: u64 = 295;
pub const HEDERA_TESTNET_CHAIN_ID: u64 = 296;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletFamily {
    /// MetaMask-style wallets taking EIP-1193 method names over a deep link.
    EvmDeepLink,
    /// Hedera wallets (HashPack, Blade) pairing against a named network.
    HederaPairing,
}

/// Deep-link actions understood by every wallet family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletAction {
    Pair,
    Sign,
    Transaction,
    Disconnect,
}

impl WalletAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WalletAction::Pair => "pair",
            WalletAction::Sign => "sign",
            WalletAction::Transaction => "transaction",
            WalletAction::Disconnect => "disconnect",
        }
    }
}

/// A wallet application reachable through a URI scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub id: String,
    pub name: String,
    /// Scheme prefix including the separator, e.g. `metamask://`.
    pub scheme: String,
    pub family: WalletFamily,
}

impl WalletInfo {
    pub fn new(id: &str, name: &str, scheme: &str, family: WalletFamily) -> Self {
        Self { id: id.to_string(), name: name.to_string(), scheme: scheme.to_string(), family }
    }

    pub fn metamask() -> Self {
        Self::new("metamask", "MetaMask", "metamask://", WalletFamily::EvmDeepLink)
    }

    pub fn trust() -> Self {
        Self::new("trust", "Trust Wallet", "trust://", WalletFamily::EvmDeepLink)
    }

    pub fn rainbow() -> Self {
        Self::new("rainbow", "Rainbow", "rainbow://", WalletFamily::EvmDeepLink)
    }

    pub fn coinbase() -> Self {
        Self::new("coinbase", "Coinbase Wallet", "cbwallet://", WalletFamily::EvmDeepLink)
    }

    pub fn hashpack() -> Self {
        Self::new("hashpack", "HashPack", "hashpack://", WalletFamily::HederaPairing)
    }

    pub fn blade() -> Self {
        Self::new("blade", "Blade", "bladewallet://", WalletFamily::HederaPairing)
    }

    pub fn builtin() -> Vec<WalletInfo> {
        vec![
            Self::metamask(),
            Self::trust(),
            Self::rainbow(),
            Self::coinbase(),
            Self::hashpack(),
            Self::blade(),
        ]
    }

    /// Reject chains this family cannot reach at all.
    pub fn check_chain(&self, chain_id: u64) -> Result<(), ConnectError> {
        match self.family {
            WalletFamily::EvmDeepLink => Ok(()),
            WalletFamily::HederaPairing => hedera_network(chain_id).map(|_| ()),
        }
    }

    pub fn pairing_payload(
        &self,
        id: &str,
        chain_id: u64,
        app_name: &str,
        callback: &str,
    ) -> Result<Value, ConnectError> {
        self.check_chain(chain_id)?;
        Ok(match self.family {
            WalletFamily::EvmDeepLink => json!({
                "id": id,
                "method": "eth_requestAccounts",
                "chainId": format!("{chain_id:#x}"),
                "dapp": { "name": app_name, "url": callback },
            }),
            WalletFamily::HederaPairing => json!({
                "id": id,
                "type": "pairing",
                "network": hedera_network(chain_id)?,
                "metadata": { "name": app_name, "url": callback },
            }),
        })
    }

    /// Chain switch request. Hedera wallets have no in-session switch and
    /// are re-paired against the other network under the same topic.
    pub fn switch_chain_payload(
        &self,
        id: &str,
        session_id: &str,
        chain_id: u64,
    ) -> Result<Value, ConnectError> {
        self.check_chain(chain_id)?;
        Ok(match self.family {
            WalletFamily::EvmDeepLink => json!({
                "id": id,
                "sessionId": session_id,
                "method": "wallet_switchEthereumChain",
                "params": [{ "chainId": format!("{chain_id:#x}") }],
            }),
            WalletFamily::HederaPairing => json!({
                "id": id,
                "type": "pairing",
                "topic": session_id,
                "network": hedera_network(chain_id)?,
            }),
        })
    }

    pub fn sign_message_payload(
        &self,
        id: &str,
        session_id: &str,
        address: &Address,
        message: &[u8],
    ) -> Value {
        let message = format!("0x{}", hex::encode(message));
        match self.family {
            WalletFamily::EvmDeepLink => json!({
                "id": id,
                "sessionId": session_id,
                "method": "personal_sign",
                "params": [message, address.to_string()],
            }),
            WalletFamily::HederaPairing => json!({
                "id": id,
                "type": "signMessage",
                "topic": session_id,
                "signer": address.to_string(),
                "message": message,
            }),
        }
    }

    pub fn sign_typed_data_payload(
        &self,
        id: &str,
        session_id: &str,
        address: &Address,
        typed_data: &Value,
    ) -> Result<Value, ConnectError> {
        match self.family {
            WalletFamily::EvmDeepLink => Ok(json!({
                "id": id,
                "sessionId": session_id,
                "method": "eth_signTypedData_v4",
                "params": [address.to_string(), typed_data.to_string()],
            })),
            WalletFamily::HederaPairing => Err(ConnectError::Unsupported {
                wallet: self.name.clone(),
                operation: "eth_signTypedData_v4".into(),
            }),
        }
    }

    pub fn transaction_payload(
        &self,
        id: &str,
        session_id: &str,
        tx: &TransactionRequest,
    ) -> Value {
        match self.family {
            WalletFamily::EvmDeepLink => json!({
                "id": id,
                "sessionId": session_id,
                "method": "eth_sendTransaction",
                "params": [tx.to_rpc_json()],
            }),
            WalletFamily::HederaPairing => json!({
                "id": id,
                "type": "transaction",
                "topic": session_id,
                "network": tx.chain_id.and_then(|c| hedera_network(c).ok()),
                "transaction": tx.to_rpc_json(),
            }),
        }
    }

    pub fn disconnect_payload(&self, id: &str, session_id: &str) -> Value {
        match self.family {
            WalletFamily::EvmDeepLink => json!({
                "id": id,
                "sessionId": session_id,
                "method": "wallet_revokePermissions",
            }),
            WalletFamily::HederaPairing => json!({
                "id": id,
                "type": "disconnect",
                "topic": session_id,
            }),
        }
    }
}

fn hedera_network(chain_id: u64) -> Result<&'static str, ConnectError> {
    match chain_id {
        HEDERA_MAINNET_CHAIN_ID => Ok("mainnet"),
        HEDERA_TESTNET_CHAIN_ID => Ok("testnet"),
        _ => Err(ConnectError::ChainNotSupported { chain_id }),
    }
}
