//! Multicall3 calldata codecs.
//!
//! Multicall3 is deployed at the same address on every supported chain.

use alloy_primitives::U256;

use crate::abi::{encode_function_call, AbiType, AbiValue};
use crate::address::Address;
use crate::decode::decode_params;
use crate::error::EthError;

/// `0xcA11bde05977b3631167028862bE2a173976CA11`
pub const MULTICALL3_ADDRESS: Address = Address::new([
    0xca, 0x11, 0xbd, 0xe0, 0x59, 0x77, 0xb3, 0x63, 0x11, 0x67, 0x02, 0x88, 0x62, 0xbe, 0x2a, 0x17,
    0x39, 0x76, 0xca, 0x11,
]);

/// `aggregate((address,bytes)[])`: `0x252dba42`.
pub const AGGREGATE_SELECTOR: [u8; 4] = [0x25, 0x2d, 0xba, 0x42];

/// `aggregate3((address,bool,bytes)[])`: `0x82ad56cb`.
pub const AGGREGATE3_SELECTOR: [u8; 4] = [0x82, 0xad, 0x56, 0xcb];

/// `getEthBalance(address)`: `0x4d2301cc`.
pub const GET_ETH_BALANCE_SELECTOR: [u8; 4] = [0x4d, 0x23, 0x01, 0xcc];

/// `getBlockNumber()`: `0x42cbb15c`.
pub const GET_BLOCK_NUMBER_SELECTOR: [u8; 4] = [0x42, 0xcb, 0xb1, 0x5c];

/// One call inside an all-or-nothing `aggregate` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    pub call_data: Vec<u8>,
}

/// One call inside an `aggregate3` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call3 {
    pub target: Address,
    pub allow_failure: bool,
    pub call_data: Vec<u8>,
}

impl Call3 {
    pub fn new(target: Address, call_data: Vec<u8>) -> Self {
        Self { target, allow_failure: true, call_data }
    }

    pub fn required(target: Address, call_data: Vec<u8>) -> Self {
        Self { target, allow_failure: false, call_data }
    }
}

/// Per-call outcome of `aggregate3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Vec<u8>,
}

/// Decoded return value of `aggregate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    pub block_number: U256,
    pub return_data: Vec<Vec<u8>>,
}

pub fn encode_aggregate(calls: &[Call]) -> Vec<u8> {
    let items = calls
        .iter()
        .map(|c| {
            AbiValue::Tuple(vec![
                AbiValue::Address(c.target),
                AbiValue::Bytes(c.call_data.clone()),
            ])
        })
        .collect();
    encode_function_call(AGGREGATE_SELECTOR, &[AbiValue::Array(items)])
}

/// Decodes `(uint256 blockNumber, bytes[] returnData)`.
pub fn decode_aggregate(data: &[u8]) -> Result<AggregateResult, EthError> {
    let decoded = decode_params(&[AbiType::Uint, AbiType::array(AbiType::Bytes)], data)?;
    let malformed = || EthError::EncodingError("malformed aggregate result".into());

    let block_number = decoded.first().and_then(AbiValue::as_uint).ok_or_else(malformed)?;
    let return_data = decoded
        .get(1)
        .and_then(AbiValue::as_slice)
        .ok_or_else(malformed)?
        .iter()
        .map(|v| v.as_bytes().map(<[u8]>::to_vec).ok_or_else(malformed))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AggregateResult { block_number, return_data })
}

pub fn encode_aggregate3(calls: &[Call3]) -> Vec<u8> {
    let items = calls
        .iter()
        .map(|c| {
            AbiValue::Tuple(vec![
                AbiValue::Address(c.target),
                AbiValue::Bool(c.allow_failure),
                AbiValue::Bytes(c.call_data.clone()),
            ])
        })
        .collect();
    encode_function_call(AGGREGATE3_SELECTOR, &[AbiValue::Array(items)])
}

/// Decodes `(bool success, bytes returnData)[]`.
pub fn decode_aggregate3(data: &[u8]) -> Result<Vec<CallResult>, EthError> {
    let ty = AbiType::array(AbiType::Tuple(vec![AbiType::Bool, AbiType::Bytes]));
    let decoded = decode_params(&[ty], data)?;
    let malformed = || EthError::EncodingError("malformed aggregate3 result".into());

    decoded
        .first()
        .and_then(AbiValue::as_slice)
        .ok_or_else(malformed)?
        .iter()
        .map(|item| {
            let fields = item.as_slice().ok_or_else(malformed)?;
            let success = fields.first().and_then(AbiValue::as_bool).ok_or_else(malformed)?;
            let return_data = fields.get(1).and_then(AbiValue::as_bytes).ok_or_else(malformed)?;
            Ok(CallResult { success, return_data: return_data.to_vec() })
        })
        .collect()
}

/// `getEthBalance(address)`, answered by the Multicall3 contract itself.
pub fn encode_get_eth_balance(address: &Address) -> Vec<u8> {
    encode_function_call(GET_ETH_BALANCE_SELECTOR, &[AbiValue::Address(*address)])
}

pub fn encode_get_block_number() -> Vec<u8> {
    GET_BLOCK_NUMBER_SELECTOR.to_vec()
}
