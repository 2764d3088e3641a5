use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::abi::keccak256;
use crate::error::EthError;

/// A 20-byte account or contract address.
///
/// The canonical textual form is `0x` followed by 40 lowercase hex characters.
/// The EIP-55 mixed-case form is derived on demand with [`Address::to_checksum`]
/// and is never what gets stored or compared.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Builds an address from a slice that must be exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EthError> {
        let raw: [u8; 20] = bytes.try_into().map_err(|_| {
            EthError::InvalidAddress(format!("expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    /// Parses a `0x`-prefixed hex address in any letter case.
    ///
    /// Non-hex characters fail with [`EthError::EncodingError`]; a well-formed
    /// hex string of the wrong length fails with [`EthError::InvalidAddress`].
    /// The checksum is not verified here, see [`verify_checksum`].
    pub fn parse(address: &str) -> Result<Self, EthError> {
        let hex_part = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EthError::EncodingError(format!(
                "address contains non-hex characters: {address}"
            )));
        }

        if hex_part.len() != 40 {
            return Err(EthError::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                hex_part.len()
            )));
        }

        let bytes =
            hex::decode(hex_part).map_err(|e| EthError::EncodingError(format!("invalid hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Returns the EIP-55 mixed-case representation.
    ///
    /// A letter is uppercased iff the matching nibble of
    /// `keccak256(lowercase_hex_without_prefix)` is >= 8.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut checksummed = String::with_capacity(42);
        checksummed.push_str("0x");

        for (i, c) in lower.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                checksummed.push(c.to_ascii_uppercase());
            } else {
                checksummed.push(c);
            }
        }

        checksummed
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = EthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl From<alloy_primitives::Address> for Address {
    fn from(address: alloy_primitives::Address) -> Self {
        Self(address.0 .0)
    }
}

impl From<Address> for alloy_primitives::Address {
    fn from(address: Address) -> Self {
        alloy_primitives::Address::new(address.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Validates an Ethereum address string.
///
/// All-lowercase and all-uppercase addresses carry no checksum and are
/// accepted as-is. Mixed-case addresses must match their EIP-55 form.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    let parsed = Address::parse(address)?;
    let hex_part = &address[2..];

    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(true);
    }

    Ok(parsed.to_checksum()[2..] == *hex_part)
}

/// Applies EIP-55 mixed-case checksum encoding to an address in any case.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    Ok(Address::parse(address)?.to_checksum())
}

/// Strict EIP-55 check: true only if `address` is exactly its checksummed form.
pub fn verify_checksum(address: &str) -> bool {
    match Address::parse(address) {
        Ok(parsed) => address.starts_with("0x") && parsed.to_checksum() == address,
        Err(_) => false,
    }
}
