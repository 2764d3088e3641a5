use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::abi::encode_hex;
use crate::address::Address;

/// An unsigned transaction handed to the external wallet for signing.
///
/// Gas fields left as `None` are filled by the wallet. Legacy chains get
/// `gas_price`; EIP-1559 chains get the two fee caps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default, with = "hex_bytes")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl TransactionRequest {
    /// A plain native-currency transfer.
    pub fn native_transfer(to: Address, value: U256) -> Self {
        Self { to, value, ..Default::default() }
    }

    /// A zero-value call to a contract with the given calldata.
    pub fn contract_call(to: Address, data: Vec<u8>) -> Self {
        Self { to, data, ..Default::default() }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// JSON-RPC transaction object (`eth_call`, `eth_estimateGas`,
    /// `eth_sendTransaction`): every quantity as a `0x` hex string, absent
    /// fields omitted.
    pub fn to_rpc_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(from) = &self.from {
            obj.insert("from".into(), json!(from.to_string()));
        }
        obj.insert("to".into(), json!(self.to.to_string()));
        if !self.value.is_zero() {
            obj.insert("value".into(), json!(format!("0x{:x}", self.value)));
        }
        if !self.data.is_empty() {
            obj.insert("data".into(), json!(encode_hex(&self.data)));
        }
        let mut quantity = |key: &str, v: Option<u128>| {
            if let Some(v) = v {
                obj.insert(key.into(), json!(format!("0x{v:x}")));
            }
        };
        quantity("gas", self.gas_limit.map(u128::from));
        quantity("gasPrice", self.gas_price);
        quantity("maxFeePerGas", self.max_fee_per_gas);
        quantity("maxPriorityFeePerGas", self.max_priority_fee_per_gas);
        quantity("nonce", self.nonce.map(u128::from));
        quantity("chainId", self.chain_id.map(u128::from));
        Value::Object(obj)
    }
}

/// On-chain outcome of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// No receipt yet. Not an error: the transaction may still be mined.
    Pending,
    Confirmed,
    /// Mined but reverted (`status == 0x0`).
    Failed,
}

/// Summary of a transaction after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub hash: String,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
}

impl TxReceipt {
    pub fn pending(hash: impl Into<String>) -> Self {
        Self { hash: hash.into(), status: TxStatus::Pending, block_number: None, gas_used: None }
    }

    pub fn is_final(&self) -> bool {
        self.status != TxStatus::Pending
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::abi::encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        crate::abi::decode_hex(&s).map_err(serde::de::Error::custom)
    }
}
