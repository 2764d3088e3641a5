//! Ethereum ABI encoding.
//!
//! Word-level encoders for every scalar type, two-pass head/tail encoding for
//! tuples containing dynamic values, and the Keccak-256 based selector and
//! topic helpers. Everything here is pure and allocation-only.

use alloy_primitives::{I256, U256};
use sha3::{Digest, Keccak256};

use crate::address::Address;
use crate::error::EthError;

/// Size of one ABI word in bytes.
pub const WORD: usize = 32;

/// Keccak-256 (the pre-standard variant Ethereum uses, not SHA3-256).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Computes the 4-byte function selector for a canonical signature such as
/// `transfer(address,uint256)`.
///
/// The signature is hashed verbatim. Passing a non-canonical form (spaces,
/// parameter names, `uint` instead of `uint256`) silently yields a different
/// selector.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Computes the 32-byte topic0 for a canonical event signature.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// A single ABI value, used both for encoding call arguments and as the
/// output of the tuple decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    /// Any `uintN`; always occupies a full word.
    Uint(U256),
    /// Any `intN`; two's complement over the full 256-bit word.
    Int(I256),
    Address(Address),
    Bool(bool),
    /// `bytesN` for N <= 32, stored already right-padded to a word.
    FixedBytes([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
    /// Dynamic-length array `T[]`.
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    /// Builds a `bytesN` value, rejecting inputs longer than 32 bytes.
    pub fn fixed_bytes(bytes: &[u8]) -> Result<Self, EthError> {
        Ok(AbiValue::FixedBytes(encode_bytes32(bytes)?))
    }

    pub fn uint(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }

    /// Whether this value is encoded in the tail section of its parent tuple.
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiValue::Bytes(_) | AbiValue::String(_) | AbiValue::Array(_) => true,
            AbiValue::Tuple(items) => items.iter().any(AbiValue::is_dynamic),
            _ => false,
        }
    }

    /// Number of bytes this value occupies in its parent's head section.
    fn head_size(&self) -> usize {
        match self {
            _ if self.is_dynamic() => WORD,
            AbiValue::Tuple(items) => items.iter().map(AbiValue::head_size).sum(),
            _ => WORD,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            AbiValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::Bytes(b) => Some(b),
            AbiValue::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an array or fields of a tuple.
    pub fn as_slice(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Array(items) | AbiValue::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

/// Type descriptor driving [`crate::decode::decode_params`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Uint,
    Int,
    Address,
    Bool,
    FixedBytes,
    Bytes,
    String,
    Array(Box<AbiType>),
    Tuple(Vec<AbiType>),
}

impl AbiType {
    pub fn array(inner: AbiType) -> Self {
        AbiType::Array(Box::new(inner))
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::Tuple(items) => items.iter().any(AbiType::is_dynamic),
            _ => false,
        }
    }

    pub(crate) fn head_size(&self) -> usize {
        match self {
            _ if self.is_dynamic() => WORD,
            AbiType::Tuple(items) => items.iter().map(AbiType::head_size).sum(),
            _ => WORD,
        }
    }
}

/// Encodes an unsigned integer as a 32-byte big-endian word.
pub fn encode_uint256(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// Encodes a signed integer in two's complement; negative values are
/// filled with `1` bits up to the full 256-bit width.
pub fn encode_int256(value: I256) -> [u8; 32] {
    value.into_raw().to_be_bytes::<32>()
}

/// Left-pads a 20-byte address to a word.
pub fn encode_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

pub fn encode_bool(value: bool) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = u8::from(value);
    word
}

/// Right-pads up to 32 bytes into a word.
pub fn encode_bytes32(bytes: &[u8]) -> Result<[u8; 32], EthError> {
    if bytes.len() > WORD {
        return Err(EthError::EncodingError(format!(
            "bytes32 value too long: {} bytes",
            bytes.len()
        )));
    }
    let mut word = [0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(word)
}

/// Encodes `bytes`: a length word followed by the payload right-padded to a
/// multiple of 32 bytes.
pub fn encode_dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded_len = padded_len(bytes.len());
    let mut out = Vec::with_capacity(WORD + padded_len);
    out.extend_from_slice(&encode_uint256(U256::from(bytes.len())));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded_len, 0);
    out
}

/// Encodes `string` as the dynamic bytes of its UTF-8 representation.
pub fn encode_string(value: &str) -> Vec<u8> {
    encode_dynamic_bytes(value.as_bytes())
}

/// Encodes `T[]`: a length word followed by the elements encoded as a tuple.
pub fn encode_array(items: &[AbiValue]) -> Vec<u8> {
    let mut out = encode_uint256(U256::from(items.len())).to_vec();
    out.extend_from_slice(&encode_params(items));
    out
}

/// Encodes a sequence of values as an ABI tuple.
///
/// Static values are written inline in the head. Dynamic values leave a
/// 32-byte offset (relative to the start of this tuple) in the head and
/// append their encoding to the tail.
pub fn encode_params(values: &[AbiValue]) -> Vec<u8> {
    let head_len: usize = values.iter().map(AbiValue::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        if value.is_dynamic() {
            let offset = head_len + tail.len();
            head.extend_from_slice(&encode_uint256(U256::from(offset)));
            tail.extend_from_slice(&encode_value(value));
        } else {
            head.extend_from_slice(&encode_value(value));
        }
    }

    head.extend_from_slice(&tail);
    head
}

fn encode_value(value: &AbiValue) -> Vec<u8> {
    match value {
        AbiValue::Uint(v) => encode_uint256(*v).to_vec(),
        AbiValue::Int(v) => encode_int256(*v).to_vec(),
        AbiValue::Address(a) => encode_address(a).to_vec(),
        AbiValue::Bool(b) => encode_bool(*b).to_vec(),
        AbiValue::FixedBytes(word) => word.to_vec(),
        AbiValue::Bytes(b) => encode_dynamic_bytes(b),
        AbiValue::String(s) => encode_string(s),
        AbiValue::Array(items) => encode_array(items),
        AbiValue::Tuple(items) => encode_params(items),
    }
}

/// Encodes a function call as `selector || encode(params)`.
pub fn encode_function_call(selector: [u8; 4], params: &[AbiValue]) -> Vec<u8> {
    let encoded = encode_params(params);
    let mut data = Vec::with_capacity(4 + encoded.len());
    data.extend_from_slice(&selector);
    data.extend_from_slice(&encoded);
    data
}

/// Like [`encode_function_call`] but derives the selector from a canonical
/// signature.
pub fn encode_call(signature: &str, params: &[AbiValue]) -> Vec<u8> {
    encode_function_call(function_selector(signature), params)
}

/// Converts a signed integer into a `uint256`, failing for negative values.
pub fn uint256_from_i256(value: I256) -> Result<U256, EthError> {
    if value.is_negative() {
        return Err(EthError::InvalidArgument(format!(
            "uint256 cannot hold negative value {value}"
        )));
    }
    Ok(value.into_raw())
}

/// Parses a decimal or `0x`-prefixed hex string into a `uint256`.
pub fn parse_uint256(input: &str) -> Result<U256, EthError> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(EthError::InvalidArgument(format!(
            "uint256 cannot be negative: {trimmed}"
        )));
    }
    if let Some(hex_part) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        if hex_part.is_empty() {
            return Ok(U256::ZERO);
        }
        return U256::from_str_radix(hex_part, 16)
            .map_err(|e| EthError::EncodingError(format!("invalid hex quantity {trimmed}: {e}")));
    }
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(EthError::InvalidArgument(format!("not a decimal integer: {input}")));
    }
    U256::from_str_radix(trimmed, 10)
        .map_err(|e| EthError::InvalidArgument(format!("uint256 out of range: {e}")))
}

/// Decodes a `0x`-prefixed (or bare) hex string into bytes.
pub fn decode_hex(input: &str) -> Result<Vec<u8>, EthError> {
    let hex_part = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    hex::decode(hex_part).map_err(|e| EthError::EncodingError(format!("invalid hex {input}: {e}")))
}

/// Encodes bytes as a `0x`-prefixed lowercase hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}
