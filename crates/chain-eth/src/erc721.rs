//! ERC-721 calldata and event codecs.

use alloy_primitives::U256;

use crate::abi::{encode_function_call, AbiValue};
use crate::address::Address;
use crate::erc20::{expect_event, TRANSFER_EVENT_TOPIC};
use crate::error::EthError;
use crate::log::{address_topic, topic_to_address, topic_to_uint, uint_topic, Log};

/// `balanceOf(address)`: `0x70a08231`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// `ownerOf(uint256)`: `0x6352211e`.
pub const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];

/// `tokenURI(uint256)`: `0xc87b56dd`.
pub const TOKEN_URI_SELECTOR: [u8; 4] = [0xc8, 0x7b, 0x56, 0xdd];

/// `getApproved(uint256)`: `0x081812fc`.
pub const GET_APPROVED_SELECTOR: [u8; 4] = [0x08, 0x18, 0x12, 0xfc];

/// `isApprovedForAll(address,address)`: `0xe985e9c5`.
pub const IS_APPROVED_FOR_ALL_SELECTOR: [u8; 4] = [0xe9, 0x85, 0xe9, 0xc5];

/// `approve(address,uint256)`: `0x095ea7b3`.
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// `setApprovalForAll(address,bool)`: `0xa22cb465`.
pub const SET_APPROVAL_FOR_ALL_SELECTOR: [u8; 4] = [0xa2, 0x2c, 0xb4, 0x65];

/// `transferFrom(address,address,uint256)`: `0x23b872dd`.
pub const TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

/// `safeTransferFrom(address,address,uint256)`: `0x42842e0e`.
pub const SAFE_TRANSFER_FROM_SELECTOR: [u8; 4] = [0x42, 0x84, 0x2e, 0x0e];

/// `safeTransferFrom(address,address,uint256,bytes)`: `0xb88d4fde`.
pub const SAFE_TRANSFER_FROM_WITH_DATA_SELECTOR: [u8; 4] = [0xb8, 0x8d, 0x4f, 0xde];

/// `supportsInterface(bytes4)`: `0x01ffc9a7`.
pub const SUPPORTS_INTERFACE_SELECTOR: [u8; 4] = [0x01, 0xff, 0xc9, 0xa7];

/// ERC-165 interface id of ERC-721.
pub const ERC721_INTERFACE_ID: [u8; 4] = [0x80, 0xac, 0x58, 0xcd];

/// `ApprovalForAll(address,address,bool)`, shared with ERC-1155.
pub const APPROVAL_FOR_ALL_EVENT_TOPIC: [u8; 32] = [
    0x17, 0x30, 0x7e, 0xab, 0x39, 0xab, 0x61, 0x07, 0xe8, 0x89, 0x98, 0x45, 0xad, 0x3d, 0x59, 0xbd,
    0x96, 0x53, 0xf2, 0x00, 0xf2, 0x20, 0x92, 0x04, 0x89, 0xca, 0x2b, 0x59, 0x37, 0x69, 0x6c, 0x31,
];

pub fn encode_balance_of(owner: &Address) -> Vec<u8> {
    encode_function_call(BALANCE_OF_SELECTOR, &[AbiValue::Address(*owner)])
}

pub fn encode_owner_of(token_id: U256) -> Vec<u8> {
    encode_function_call(OWNER_OF_SELECTOR, &[AbiValue::Uint(token_id)])
}

pub fn encode_token_uri(token_id: U256) -> Vec<u8> {
    encode_function_call(TOKEN_URI_SELECTOR, &[AbiValue::Uint(token_id)])
}

pub fn encode_get_approved(token_id: U256) -> Vec<u8> {
    encode_function_call(GET_APPROVED_SELECTOR, &[AbiValue::Uint(token_id)])
}

/// Encodes `isApprovedForAll(owner, operator)`. ERC-1155 uses the same selector.
pub fn encode_is_approved_for_all(owner: &Address, operator: &Address) -> Vec<u8> {
    encode_function_call(
        IS_APPROVED_FOR_ALL_SELECTOR,
        &[AbiValue::Address(*owner), AbiValue::Address(*operator)],
    )
}

pub fn encode_approve(to: &Address, token_id: U256) -> Vec<u8> {
    encode_function_call(APPROVE_SELECTOR, &[AbiValue::Address(*to), AbiValue::Uint(token_id)])
}

/// Encodes `setApprovalForAll(operator, approved)`. ERC-1155 uses the same selector.
pub fn encode_set_approval_for_all(operator: &Address, approved: bool) -> Vec<u8> {
    encode_function_call(
        SET_APPROVAL_FOR_ALL_SELECTOR,
        &[AbiValue::Address(*operator), AbiValue::Bool(approved)],
    )
}

pub fn encode_transfer_from(from: &Address, to: &Address, token_id: U256) -> Vec<u8> {
    encode_function_call(
        TRANSFER_FROM_SELECTOR,
        &[AbiValue::Address(*from), AbiValue::Address(*to), AbiValue::Uint(token_id)],
    )
}

/// Encodes `safeTransferFrom`. The four-argument overload is used only when
/// `data` is given.
pub fn encode_safe_transfer_from(
    from: &Address,
    to: &Address,
    token_id: U256,
    data: Option<&[u8]>,
) -> Vec<u8> {
    let mut params = vec![
        AbiValue::Address(*from),
        AbiValue::Address(*to),
        AbiValue::Uint(token_id),
    ];
    match data {
        Some(data) => {
            params.push(AbiValue::Bytes(data.to_vec()));
            encode_function_call(SAFE_TRANSFER_FROM_WITH_DATA_SELECTOR, &params)
        }
        None => encode_function_call(SAFE_TRANSFER_FROM_SELECTOR, &params),
    }
}

pub fn encode_supports_interface(interface_id: [u8; 4]) -> Vec<u8> {
    let mut word = [0u8; 32];
    word[..4].copy_from_slice(&interface_id);
    encode_function_call(SUPPORTS_INTERFACE_SELECTOR, &[AbiValue::FixedBytes(word)])
}

/// A decoded ERC-721 `Transfer` event. All three parameters are indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftTransferEvent {
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<[u8; 32]>,
}

pub fn transfer_topics(
    from: Option<&Address>,
    to: Option<&Address>,
    token_id: Option<U256>,
) -> Vec<Option<[u8; 32]>> {
    vec![
        Some(TRANSFER_EVENT_TOPIC),
        from.map(address_topic),
        to.map(address_topic),
        token_id.map(uint_topic),
    ]
}

pub fn decode_transfer_log(log: &Log) -> Result<NftTransferEvent, EthError> {
    expect_event(log, &TRANSFER_EVENT_TOPIC, "Transfer")?;
    Ok(NftTransferEvent {
        from: topic_to_address(log.topic(1)?),
        to: topic_to_address(log.topic(2)?),
        token_id: topic_to_uint(log.topic(3)?),
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    })
}
