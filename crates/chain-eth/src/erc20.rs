//! ERC-20 calldata and event codecs.

use alloy_primitives::U256;

use crate::abi::{encode_function_call, AbiType, AbiValue};
use crate::address::Address;
use crate::decode::decode_params;
use crate::error::EthError;
use crate::log::{address_topic, topic_to_address, Log};

/// `name()`: `0x06fdde03`.
pub const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];

/// `symbol()`: `0x95d89b41`.
pub const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];

/// `decimals()`: `0x313ce567`.
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// `totalSupply()`: `0x18160ddd`.
pub const TOTAL_SUPPLY_SELECTOR: [u8; 4] = [0x18, 0x16, 0x0d, 0xdd];

/// `balanceOf(address)`: `0x70a08231`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// `allowance(address,address)`: `0xdd62ed3e`.
pub const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];

/// `transfer(address,uint256)`: `0xa9059cbb`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// `approve(address,uint256)`: `0x095ea7b3`.
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// `transferFrom(address,address,uint256)`: `0x23b872dd`.
pub const TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

/// `Transfer(address,address,uint256)`.
pub const TRANSFER_EVENT_TOPIC: [u8; 32] = [
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
];

/// `Approval(address,address,uint256)`.
pub const APPROVAL_EVENT_TOPIC: [u8; 32] = [
    0x8c, 0x5b, 0xe1, 0xe5, 0xeb, 0xec, 0x7d, 0x5b, 0xd1, 0x4f, 0x71, 0x42, 0x7d, 0x1e, 0x84, 0xf3,
    0xdd, 0x03, 0x14, 0xc0, 0xf7, 0xb2, 0x29, 0x1e, 0x5b, 0x20, 0x0a, 0xc8, 0xc7, 0xc3, 0xb9, 0x25,
];

pub fn encode_name() -> Vec<u8> {
    NAME_SELECTOR.to_vec()
}

pub fn encode_symbol() -> Vec<u8> {
    SYMBOL_SELECTOR.to_vec()
}

pub fn encode_decimals() -> Vec<u8> {
    DECIMALS_SELECTOR.to_vec()
}

pub fn encode_total_supply() -> Vec<u8> {
    TOTAL_SUPPLY_SELECTOR.to_vec()
}

/// Encodes `balanceOf(owner)`.
pub fn encode_balance_of(owner: &Address) -> Vec<u8> {
    encode_function_call(BALANCE_OF_SELECTOR, &[AbiValue::Address(*owner)])
}

/// Encodes `allowance(owner, spender)`.
pub fn encode_allowance(owner: &Address, spender: &Address) -> Vec<u8> {
    encode_function_call(
        ALLOWANCE_SELECTOR,
        &[AbiValue::Address(*owner), AbiValue::Address(*spender)],
    )
}

/// Encodes `transfer(to, amount)`: 4-byte selector plus two words.
pub fn encode_transfer(to: &Address, amount: U256) -> Vec<u8> {
    encode_function_call(TRANSFER_SELECTOR, &[AbiValue::Address(*to), AbiValue::Uint(amount)])
}

/// Encodes `approve(spender, amount)`.
pub fn encode_approve(spender: &Address, amount: U256) -> Vec<u8> {
    encode_function_call(
        APPROVE_SELECTOR,
        &[AbiValue::Address(*spender), AbiValue::Uint(amount)],
    )
}

/// Encodes `transferFrom(from, to, amount)`.
pub fn encode_transfer_from(from: &Address, to: &Address, amount: U256) -> Vec<u8> {
    encode_function_call(
        TRANSFER_FROM_SELECTOR,
        &[AbiValue::Address(*from), AbiValue::Address(*to), AbiValue::Uint(amount)],
    )
}

/// A decoded `Transfer` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<[u8; 32]>,
}

/// A decoded `Approval` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalEvent {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<[u8; 32]>,
}

/// Topic filter for `Transfer` with optional sender/recipient constraints.
pub fn transfer_topics(from: Option<&Address>, to: Option<&Address>) -> Vec<Option<[u8; 32]>> {
    vec![
        Some(TRANSFER_EVENT_TOPIC),
        from.map(address_topic),
        to.map(address_topic),
    ]
}

/// Decodes an ERC-20 `Transfer` log: `from` and `to` are indexed, `value`
/// lives in the data blob.
pub fn decode_transfer_log(log: &Log) -> Result<TransferEvent, EthError> {
    expect_event(log, &TRANSFER_EVENT_TOPIC, "Transfer")?;
    let from = topic_to_address(log.topic(1)?);
    let to = topic_to_address(log.topic(2)?);
    let value = single_uint(&log.data)?;
    Ok(TransferEvent {
        from,
        to,
        value,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    })
}

pub fn decode_approval_log(log: &Log) -> Result<ApprovalEvent, EthError> {
    expect_event(log, &APPROVAL_EVENT_TOPIC, "Approval")?;
    let owner = topic_to_address(log.topic(1)?);
    let spender = topic_to_address(log.topic(2)?);
    let value = single_uint(&log.data)?;
    Ok(ApprovalEvent {
        owner,
        spender,
        value,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    })
}

pub(crate) fn expect_event(log: &Log, topic: &[u8; 32], name: &str) -> Result<(), EthError> {
    if log.is_event(topic) {
        Ok(())
    } else {
        Err(EthError::EncodingError(format!("log is not a {name} event")))
    }
}

fn single_uint(data: &[u8]) -> Result<U256, EthError> {
    decode_params(&[AbiType::Uint], data)?
        .first()
        .and_then(AbiValue::as_uint)
        .ok_or_else(|| EthError::EncodingError("missing uint256 in log data".into()))
}
