//! Ethereum ABI decoding.
//!
//! [`decode_params`] is the exact inverse of [`crate::abi::encode_params`] for
//! a known type list. The single-value helpers below decode `eth_call` return
//! data directly and tolerate both layouts seen for a lone dynamic return
//! value: `offset(0x20) || length || payload` and the bare `length || payload`.

use alloy_primitives::{I256, U256};

use crate::abi::{AbiType, AbiValue, WORD};
use crate::address::Address;
use crate::error::EthError;

/// Decodes `data` as a tuple of the given types.
pub fn decode_params(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    decode_tuple(types, data, 0)
}

fn decode_tuple(types: &[AbiType], data: &[u8], base: usize) -> Result<Vec<AbiValue>, EthError> {
    let mut values = Vec::with_capacity(types.len());
    let mut head = base;

    for ty in types {
        if ty.is_dynamic() {
            let offset = read_usize(data, head)?;
            let pos = base
                .checked_add(offset)
                .ok_or_else(|| EthError::EncodingError("offset overflow".into()))?;
            values.push(decode_value(ty, data, pos)?);
            head += WORD;
        } else {
            values.push(decode_value(ty, data, head)?);
            head += ty.head_size();
        }
    }

    Ok(values)
}

fn decode_value(ty: &AbiType, data: &[u8], pos: usize) -> Result<AbiValue, EthError> {
    match ty {
        AbiType::Uint => Ok(AbiValue::Uint(U256::from_be_bytes(word_at(data, pos)?))),
        AbiType::Int => Ok(AbiValue::Int(I256::from_raw(U256::from_be_bytes(word_at(
            data, pos,
        )?)))),
        AbiType::Address => Ok(AbiValue::Address(address_from_word(&word_at(data, pos)?))),
        AbiType::Bool => Ok(AbiValue::Bool(bool_from_word(&word_at(data, pos)?)?)),
        AbiType::FixedBytes => Ok(AbiValue::FixedBytes(word_at(data, pos)?)),
        AbiType::Bytes => Ok(AbiValue::Bytes(length_prefixed(data, pos)?.to_vec())),
        AbiType::String => {
            let raw = length_prefixed(data, pos)?;
            Ok(AbiValue::String(utf8(raw)?))
        }
        AbiType::Array(inner) => {
            let len = read_usize(data, pos)?;
            let min_size = len.saturating_mul(inner.head_size());
            if min_size > data.len().saturating_sub(pos + WORD) {
                return Err(EthError::EncodingError(format!(
                    "array length {len} exceeds available data"
                )));
            }
            let types = vec![(**inner).clone(); len];
            Ok(AbiValue::Array(decode_tuple(&types, data, pos + WORD)?))
        }
        AbiType::Tuple(types) => Ok(AbiValue::Tuple(decode_tuple(types, data, pos)?)),
    }
}

/// Decodes the first word as a `uint256`.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EthError> {
    Ok(U256::from_be_bytes(word_at(data, 0)?))
}

/// Decodes the first word as a two's complement `int256`.
pub fn decode_int256(data: &[u8]) -> Result<I256, EthError> {
    Ok(I256::from_raw(decode_uint256(data)?))
}

/// Decodes the first word as an address (last 20 bytes of the word).
pub fn decode_address(data: &[u8]) -> Result<Address, EthError> {
    Ok(address_from_word(&word_at(data, 0)?))
}

pub fn decode_bool(data: &[u8]) -> Result<bool, EthError> {
    bool_from_word(&word_at(data, 0)?)
}

pub fn decode_bytes32(data: &[u8]) -> Result<[u8; 32], EthError> {
    word_at(data, 0)
}

/// Decodes a lone `bytes` return value in either layout.
pub fn decode_bytes(data: &[u8]) -> Result<Vec<u8>, EthError> {
    let start = dynamic_start(data)?;
    Ok(length_prefixed(data, start)?.to_vec())
}

/// Decodes a lone `string` return value in either layout.
pub fn decode_string(data: &[u8]) -> Result<String, EthError> {
    let start = dynamic_start(data)?;
    utf8(length_prefixed(data, start)?)
}

/// Decodes a `string` return value, falling back to a NUL-trimmed `bytes32`
/// for legacy tokens (e.g. MKR) whose `name()`/`symbol()` return one word.
pub fn decode_string_or_bytes32(data: &[u8]) -> Result<String, EthError> {
    if data.len() == WORD {
        let end = data.iter().position(|b| *b == 0).unwrap_or(WORD);
        return utf8(&data[..end]);
    }
    decode_string(data)
}

/// Decodes a lone `uint256[]` return value in either layout.
pub fn decode_uint256_array(data: &[u8]) -> Result<Vec<U256>, EthError> {
    let start = dynamic_start(data)?;
    let len = read_usize(data, start)?;
    (0..len)
        .map(|i| Ok(U256::from_be_bytes(word_at(data, start + WORD + i * WORD)?)))
        .collect()
}

/// Decodes a lone `address[]` return value in either layout.
pub fn decode_address_array(data: &[u8]) -> Result<Vec<Address>, EthError> {
    let start = dynamic_start(data)?;
    let len = read_usize(data, start)?;
    (0..len)
        .map(|i| Ok(address_from_word(&word_at(data, start + WORD + i * WORD)?)))
        .collect()
}

/// Where the length word of a lone dynamic return value lives.
///
/// A leading word of exactly 0x20 is taken as the standard head offset,
/// provided the length it points at fits in the data. Anything else is read
/// as the bare `length || payload` layout.
fn dynamic_start(data: &[u8]) -> Result<usize, EthError> {
    if data.len() < WORD {
        return Err(EthError::EncodingError(format!(
            "expected at least 32 bytes of dynamic data, got {}",
            data.len()
        )));
    }
    if data.len() >= 2 * WORD && read_usize(data, 0)? == WORD {
        if let Ok(len) = read_usize(data, WORD) {
            if len <= data.len() - 2 * WORD {
                return Ok(WORD);
            }
        }
    }
    Ok(0)
}

fn length_prefixed(data: &[u8], pos: usize) -> Result<&[u8], EthError> {
    let len = read_usize(data, pos)?;
    let start = pos + WORD;
    let end = start
        .checked_add(len)
        .ok_or_else(|| EthError::EncodingError("length overflow".into()))?;
    data.get(start..end).ok_or_else(|| {
        EthError::EncodingError(format!(
            "dynamic value of {len} bytes at {start} exceeds data length {}",
            data.len()
        ))
    })
}

fn word_at(data: &[u8], pos: usize) -> Result<[u8; 32], EthError> {
    let slice = pos
        .checked_add(WORD)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| {
            EthError::EncodingError(format!(
                "expected a 32-byte word at offset {pos}, data is {} bytes",
                data.len()
            ))
        })?;
    let mut word = [0u8; 32];
    word.copy_from_slice(slice);
    Ok(word)
}

fn read_usize(data: &[u8], pos: usize) -> Result<usize, EthError> {
    let word = word_at(data, pos)?;
    if word[..24].iter().any(|b| *b != 0) {
        return Err(EthError::EncodingError(format!(
            "offset/length at {pos} does not fit in 64 bits"
        )));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(raw))
        .map_err(|_| EthError::EncodingError(format!("offset/length at {pos} too large")))
}

fn address_from_word(word: &[u8; 32]) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Address::new(bytes)
}

fn bool_from_word(word: &[u8; 32]) -> Result<bool, EthError> {
    if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
        return Err(EthError::EncodingError("bool word is not 0 or 1".into()));
    }
    Ok(word[31] == 1)
}

fn utf8(raw: &[u8]) -> Result<String, EthError> {
    String::from_utf8(raw.to_vec())
        .map_err(|e| EthError::EncodingError(format!("invalid utf-8 string: {e}")))
}
