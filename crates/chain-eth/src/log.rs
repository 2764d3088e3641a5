use alloy_primitives::U256;

use crate::abi::{encode_address, encode_uint256};
use crate::address::Address;
use crate::error::EthError;

/// An event log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    /// `topics[0]` is the event signature hash; indexed parameters follow.
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<[u8; 32]>,
    pub log_index: Option<u64>,
}

impl Log {
    /// True if `topics[0]` equals `event_topic`.
    pub fn is_event(&self, event_topic: &[u8; 32]) -> bool {
        self.topics.first() == Some(event_topic)
    }

    pub fn topic(&self, index: usize) -> Result<&[u8; 32], EthError> {
        self.topics.get(index).ok_or_else(|| {
            EthError::EncodingError(format!(
                "log has {} topics, expected at least {}",
                self.topics.len(),
                index + 1
            ))
        })
    }

    pub fn transaction_hash_hex(&self) -> Option<String> {
        self.transaction_hash.map(|h| format!("0x{}", hex::encode(h)))
    }
}

/// Indexed address parameter as it appears in a topic slot.
pub fn address_topic(address: &Address) -> [u8; 32] {
    encode_address(address)
}

/// Indexed uint256 parameter as it appears in a topic slot.
pub fn uint_topic(value: U256) -> [u8; 32] {
    encode_uint256(value)
}

pub fn topic_to_address(topic: &[u8; 32]) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&topic[12..]);
    Address::new(bytes)
}

pub fn topic_to_uint(topic: &[u8; 32]) -> U256 {
    U256::from_be_bytes(*topic)
}
