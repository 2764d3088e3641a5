//! Typed views of JSON-RPC parameters and results.

use std::fmt;

use alloy_primitives::U256;
use chain_eth::abi::{decode_hex, encode_hex};
use chain_eth::{Address, Log, TxReceipt, TxStatus};
use serde_json::{json, Value};

use crate::error::RpcError;

/// Block selector for state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Pending,
    Earliest,
    Safe,
    Finalized,
    Number(u64),
}

impl BlockTag {
    pub fn to_json(self) -> Value {
        json!(self.to_string())
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Pending => f.write_str("pending"),
            BlockTag::Earliest => f.write_str("earliest"),
            BlockTag::Safe => f.write_str("safe"),
            BlockTag::Finalized => f.write_str("finalized"),
            BlockTag::Number(n) => write!(f, "{n:#x}"),
        }
    }
}

impl From<u64> for BlockTag {
    fn from(n: u64) -> Self {
        BlockTag::Number(n)
    }
}

/// `eth_getLogs` filter.
///
/// `topics` is positional: `None` matches anything in that slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Option<Address>,
    pub topics: Vec<Option<[u8; 32]>>,
    pub from_block: Option<BlockTag>,
    pub to_block: Option<BlockTag>,
}

impl LogFilter {
    pub fn new(address: Address) -> Self {
        Self { address: Some(address), ..Default::default() }
    }

    pub fn topics(mut self, topics: Vec<Option<[u8; 32]>>) -> Self {
        self.topics = topics;
        self
    }

    pub fn from_block(mut self, block: impl Into<BlockTag>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    pub fn to_block(mut self, block: impl Into<BlockTag>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    /// Filter object with trailing wildcard topics dropped.
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(address) = &self.address {
            obj.insert("address".into(), json!(address.to_string()));
        }
        let used = self
            .topics
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1);
        if used > 0 {
            let topics: Vec<Value> = self.topics[..used]
                .iter()
                .map(|t| t.map_or(Value::Null, |t| json!(encode_hex(&t))))
                .collect();
            obj.insert("topics".into(), Value::Array(topics));
        }
        if let Some(from) = self.from_block {
            obj.insert("fromBlock".into(), from.to_json());
        }
        if let Some(to) = self.to_block {
            obj.insert("toBlock".into(), to.to_json());
        }
        Value::Object(obj)
    }
}

/// `eth_getTransactionReceipt` result, reduced to what callers use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    /// `Some(true)` for success; absent on pre-Byzantium receipts.
    pub status: Option<bool>,
    pub gas_used: Option<u64>,
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
}

impl RpcReceipt {
    pub fn from_json(value: &Value) -> Result<Self, RpcError> {
        let transaction_hash = value
            .get("transactionHash")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidResponse("receipt without transactionHash".into()))?
            .to_string();
        let status = optional_quantity(value, "status")?.map(|s| s == 1);
        let contract_address = match value.get("contractAddress").and_then(Value::as_str) {
            Some(addr) => Some(Address::parse(addr)?),
            None => None,
        };
        let logs = match value.get("logs").and_then(Value::as_array) {
            Some(logs) => logs.iter().map(parse_log).collect::<Result<_, _>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            transaction_hash,
            block_number: optional_quantity(value, "blockNumber")?,
            status,
            gas_used: optional_quantity(value, "gasUsed")?,
            contract_address,
            logs,
        })
    }

    /// Confirmed unless the receipt explicitly reports a revert.
    pub fn to_tx_receipt(&self) -> TxReceipt {
        let status = match self.status {
            Some(false) => TxStatus::Failed,
            _ => TxStatus::Confirmed,
        };
        TxReceipt {
            hash: self.transaction_hash.clone(),
            status,
            block_number: self.block_number,
            gas_used: self.gas_used,
        }
    }
}

/// Parses one entry of an `eth_getLogs` result.
pub fn parse_log(value: &Value) -> Result<Log, RpcError> {
    let address = value
        .get("address")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidResponse("log without address".into()))?;
    let topics = value
        .get("topics")
        .and_then(Value::as_array)
        .map(|topics| {
            topics
                .iter()
                .map(|t| {
                    t.as_str()
                        .ok_or_else(|| RpcError::InvalidResponse("non-string topic".into()))
                        .and_then(parse_word)
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    let data = match value.get("data").and_then(Value::as_str) {
        Some(data) => decode_hex(data)?,
        None => Vec::new(),
    };
    let transaction_hash = match value.get("transactionHash").and_then(Value::as_str) {
        Some(hash) => Some(parse_word(hash)?),
        None => None,
    };
    Ok(Log {
        address: Address::parse(address)?,
        topics,
        data,
        block_number: optional_quantity(value, "blockNumber")?,
        transaction_hash,
        log_index: optional_quantity(value, "logIndex")?,
    })
}

fn parse_word(hex: &str) -> Result<[u8; 32], RpcError> {
    let bytes = decode_hex(hex)?;
    bytes
        .try_into()
        .map_err(|_| RpcError::InvalidResponse(format!("expected 32-byte hex value, got {hex}")))
}

fn optional_quantity(value: &Value, key: &str) -> Result<Option<u64>, RpcError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_u64(v).map(Some),
    }
}

/// Parses a `0x` hex quantity into a `U256`.
pub fn parse_u256(value: &Value) -> Result<U256, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected hex quantity, got {value}")))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::InvalidResponse(format!("quantity without 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("invalid quantity {s}: {e}")))
}

pub fn parse_u64(value: &Value) -> Result<u64, RpcError> {
    let n = parse_u256(value)?;
    u64::try_from(n).map_err(|_| RpcError::InvalidResponse(format!("quantity {n} exceeds u64")))
}

/// Parses a `0x` hex data string.
pub fn parse_bytes(value: &Value) -> Result<Vec<u8>, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected hex data, got {value}")))?;
    Ok(decode_hex(s)?)
}

pub fn quantity(n: U256) -> Value {
    json!(format!("0x{n:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_tag_rendering() {
        assert_eq!(BlockTag::Latest.to_string(), "latest");
        assert_eq!(BlockTag::Pending.to_string(), "pending");
        assert_eq!(BlockTag::Number(255).to_string(), "0xff");
        assert_eq!(BlockTag::Number(0).to_string(), "0x0");
    }

    #[test]
    fn log_filter_trims_trailing_wildcards() {
        let filter = LogFilter::new(Address::ZERO)
            .topics(vec![Some([1u8; 32]), None, None])
            .from_block(100)
            .to_block(BlockTag::Latest);
        let json = filter.to_json();
        assert_eq!(json["topics"].as_array().unwrap().len(), 1);
        assert_eq!(json["fromBlock"], "0x64");
        assert_eq!(json["toBlock"], "latest");
    }

    #[test]
    fn log_filter_keeps_inner_wildcards() {
        let filter = LogFilter::new(Address::ZERO).topics(vec![Some([1u8; 32]), None, Some([2u8; 32])]);
        let json = filter.to_json();
        let topics = json["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 3);
        assert!(topics[1].is_null());
        assert_eq!(topics[2], json!(format!("0x{}", "02".repeat(32))));
    }

    #[test]
    fn log_filter_all_wildcards_omits_topics() {
        let filter = LogFilter::new(Address::ZERO).topics(vec![None, None]);
        assert!(filter.to_json().get("topics").is_none());
    }

    #[test]
    fn parse_quantities() {
        assert_eq!(parse_u64(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_u64(&json!("0x5208")).unwrap(), 21000);
        assert_eq!(parse_u256(&json!("0x")).unwrap(), U256::ZERO);
        assert!(parse_u64(&json!("21000")).is_err());
        assert!(parse_u64(&json!(21000)).is_err());
        assert!(parse_u64(&json!("0x1ffffffffffffffff")).is_err());
    }

    #[test]
    fn parse_receipt_statuses() {
        let ok = json!({
            "transactionHash": "0xabc",
            "blockNumber": "0x10",
            "status": "0x1",
            "gasUsed": "0x5208",
            "contractAddress": null,
            "logs": []
        });
        let receipt = RpcReceipt::from_json(&ok).unwrap();
        assert_eq!(receipt.block_number, Some(16));
        assert_eq!(receipt.to_tx_receipt().status, TxStatus::Confirmed);

        let failed = json!({"transactionHash": "0xabc", "blockNumber": "0x10", "status": "0x0"});
        let receipt = RpcReceipt::from_json(&failed).unwrap();
        assert_eq!(receipt.to_tx_receipt().status, TxStatus::Failed);
    }

    #[test]
    fn parse_log_entry() {
        let topic = format!("0x{}", "11".repeat(32));
        let value = json!({
            "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "topics": [topic],
            "data": "0x01",
            "blockNumber": "0x1",
            "transactionHash": format!("0x{}", "22".repeat(32)),
            "logIndex": "0x3"
        });
        let log = parse_log(&value).unwrap();
        assert_eq!(log.topics, vec![[0x11u8; 32]]);
        assert_eq!(log.data, vec![1]);
        assert_eq!(log.log_index, Some(3));
        assert_eq!(log.transaction_hash, Some([0x22u8; 32]));
    }

    #[test]
    fn parse_log_rejects_short_topic() {
        let value = json!({"address": "0x0000000000000000000000000000000000000000", "topics": ["0x01"]});
        assert!(parse_log(&value).is_err());
    }
}
