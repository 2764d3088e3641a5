//! ERC-1155 calldata and event codecs.

use alloy_primitives::U256;

use crate::abi::{encode_function_call, AbiType, AbiValue};
use crate::address::Address;
use crate::decode::decode_params;
use crate::erc20::expect_event;
use crate::error::EthError;
use crate::log::{address_topic, topic_to_address, Log};

/// `balanceOf(address,uint256)`: `0x00fdd58e`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x00, 0xfd, 0xd5, 0x8e];

/// `balanceOfBatch(address[],uint256[])`: `0x4e1273f4`.
pub const BALANCE_OF_BATCH_SELECTOR: [u8; 4] = [0x4e, 0x12, 0x73, 0xf4];

/// `uri(uint256)`: `0x0e89341c`.
pub const URI_SELECTOR: [u8; 4] = [0x0e, 0x89, 0x34, 0x1c];

/// `safeTransferFrom(address,address,uint256,uint256,bytes)`: `0xf242432a`.
pub const SAFE_TRANSFER_FROM_SELECTOR: [u8; 4] = [0xf2, 0x42, 0x43, 0x2a];

/// `safeBatchTransferFrom(address,address,uint256[],uint256[],bytes)`: `0x2eb2c2d6`.
pub const SAFE_BATCH_TRANSFER_FROM_SELECTOR: [u8; 4] = [0x2e, 0xb2, 0xc2, 0xd6];

/// `TransferSingle(address,address,address,uint256,uint256)`.
pub const TRANSFER_SINGLE_EVENT_TOPIC: [u8; 32] = [
    0xc3, 0xd5, 0x81, 0x68, 0xc5, 0xae, 0x73, 0x97, 0x73, 0x1d, 0x06, 0x3d, 0x5b, 0xbf, 0x3d, 0x65,
    0x78, 0x54, 0x42, 0x73, 0x43, 0xf4, 0xc0, 0x83, 0x24, 0x0f, 0x7a, 0xac, 0xaa, 0x2d, 0x0f, 0x62,
];

/// `TransferBatch(address,address,address,uint256[],uint256[])`.
pub const TRANSFER_BATCH_EVENT_TOPIC: [u8; 32] = [
    0x4a, 0x39, 0xdc, 0x06, 0xd4, 0xc0, 0xdb, 0xc6, 0x4b, 0x70, 0xaf, 0x90, 0xfd, 0x69, 0x8a, 0x23,
    0x3a, 0x51, 0x8a, 0xa5, 0xd0, 0x8e, 0x59, 0x5d, 0x98, 0x3b, 0x8c, 0x05, 0x26, 0xc8, 0xf7, 0xfb,
];

pub fn encode_balance_of(owner: &Address, id: U256) -> Vec<u8> {
    encode_function_call(BALANCE_OF_SELECTOR, &[AbiValue::Address(*owner), AbiValue::Uint(id)])
}

/// Encodes `balanceOfBatch(owners, ids)`; both lists must have the same length.
pub fn encode_balance_of_batch(owners: &[Address], ids: &[U256]) -> Result<Vec<u8>, EthError> {
    check_lengths(owners.len(), ids.len(), "owners", "ids")?;
    Ok(encode_function_call(
        BALANCE_OF_BATCH_SELECTOR,
        &[
            AbiValue::Array(owners.iter().copied().map(AbiValue::Address).collect()),
            AbiValue::Array(ids.iter().copied().map(AbiValue::Uint).collect()),
        ],
    ))
}

pub fn encode_uri(id: U256) -> Vec<u8> {
    encode_function_call(URI_SELECTOR, &[AbiValue::Uint(id)])
}

pub fn encode_safe_transfer_from(
    from: &Address,
    to: &Address,
    id: U256,
    amount: U256,
    data: &[u8],
) -> Vec<u8> {
    encode_function_call(
        SAFE_TRANSFER_FROM_SELECTOR,
        &[
            AbiValue::Address(*from),
            AbiValue::Address(*to),
            AbiValue::Uint(id),
            AbiValue::Uint(amount),
            AbiValue::Bytes(data.to_vec()),
        ],
    )
}

/// Encodes `safeBatchTransferFrom`; `ids` and `amounts` must pair up.
pub fn encode_safe_batch_transfer_from(
    from: &Address,
    to: &Address,
    ids: &[U256],
    amounts: &[U256],
    data: &[u8],
) -> Result<Vec<u8>, EthError> {
    check_lengths(ids.len(), amounts.len(), "ids", "amounts")?;
    Ok(encode_function_call(
        SAFE_BATCH_TRANSFER_FROM_SELECTOR,
        &[
            AbiValue::Address(*from),
            AbiValue::Address(*to),
            AbiValue::Array(ids.iter().copied().map(AbiValue::Uint).collect()),
            AbiValue::Array(amounts.iter().copied().map(AbiValue::Uint).collect()),
            AbiValue::Bytes(data.to_vec()),
        ],
    ))
}

fn check_lengths(a: usize, b: usize, a_name: &str, b_name: &str) -> Result<(), EthError> {
    if a != b {
        return Err(EthError::InvalidArgument(format!(
            "{a_name} and {b_name} length mismatch: {a} != {b}"
        )));
    }
    Ok(())
}

/// Substitutes the `{id}` placeholder with the token id as 64 lowercase hex
/// characters, zero-padded, as the metadata URI convention requires.
pub fn substitute_uri_id(template: &str, id: U256) -> String {
    if !template.contains("{id}") {
        return template.to_string();
    }
    template.replace("{id}", &hex::encode(id.to_be_bytes::<32>()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSingleEvent {
    pub operator: Address,
    pub from: Address,
    pub to: Address,
    pub id: U256,
    pub value: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<[u8; 32]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBatchEvent {
    pub operator: Address,
    pub from: Address,
    pub to: Address,
    pub ids: Vec<U256>,
    pub values: Vec<U256>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<[u8; 32]>,
}

/// Topic filter shared by `TransferSingle` and `TransferBatch`.
pub fn transfer_topics(
    event_topic: [u8; 32],
    operator: Option<&Address>,
    from: Option<&Address>,
    to: Option<&Address>,
) -> Vec<Option<[u8; 32]>> {
    vec![
        Some(event_topic),
        operator.map(address_topic),
        from.map(address_topic),
        to.map(address_topic),
    ]
}

/// `operator`, `from` and `to` are indexed; `(id, value)` is the data blob.
pub fn decode_transfer_single_log(log: &Log) -> Result<TransferSingleEvent, EthError> {
    expect_event(log, &TRANSFER_SINGLE_EVENT_TOPIC, "TransferSingle")?;
    let values = decode_params(&[AbiType::Uint, AbiType::Uint], &log.data)?;
    let uint_at = |i: usize| {
        values
            .get(i)
            .and_then(AbiValue::as_uint)
            .ok_or_else(|| EthError::EncodingError("malformed TransferSingle data".into()))
    };
    Ok(TransferSingleEvent {
        operator: topic_to_address(log.topic(1)?),
        from: topic_to_address(log.topic(2)?),
        to: topic_to_address(log.topic(3)?),
        id: uint_at(0)?,
        value: uint_at(1)?,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    })
}

/// `(ids[], values[])` is ABI-tuple-encoded in the data blob.
pub fn decode_transfer_batch_log(log: &Log) -> Result<TransferBatchEvent, EthError> {
    expect_event(log, &TRANSFER_BATCH_EVENT_TOPIC, "TransferBatch")?;
    let decoded = decode_params(
        &[AbiType::array(AbiType::Uint), AbiType::array(AbiType::Uint)],
        &log.data,
    )?;
    let uints_at = |i: usize| -> Result<Vec<U256>, EthError> {
        decoded
            .get(i)
            .and_then(AbiValue::as_slice)
            .ok_or_else(|| EthError::EncodingError("malformed TransferBatch data".into()))?
            .iter()
            .map(|v| {
                v.as_uint()
                    .ok_or_else(|| EthError::EncodingError("non-uint in TransferBatch".into()))
            })
            .collect()
    };
    let ids = uints_at(0)?;
    let values = uints_at(1)?;
    check_lengths(ids.len(), values.len(), "ids", "values")?;

    Ok(TransferBatchEvent {
        operator: topic_to_address(log.topic(1)?),
        from: topic_to_address(log.topic(2)?),
        to: topic_to_address(log.topic(3)?),
        ids,
        values,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    })
}
