//! Known-token table (chain id -> token metadata).
//!
//! The default table is the JSON file under `data/tokens.json`; callers can
//! load their own with [`TokenRegistry::from_json`] and merge it on top.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::EthError;

const BUILTIN_TOKENS: &str = include_str!("../data/tokens.json");

/// Metadata of a deployed fungible token.
///
/// `name`, `symbol` and `decimals` cannot change after deployment, so a
/// value fetched once for an address on a given chain may be cached forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<U256>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: BTreeMap<u64, Vec<TokenMetadata>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry loaded from the bundled token table.
    pub fn builtin() -> Result<Self, EthError> {
        Self::from_json(BUILTIN_TOKENS)
    }

    /// Parses a `{ "<chainId>": [TokenMetadata, ...] }` document.
    pub fn from_json(json: &str) -> Result<Self, EthError> {
        let tokens: BTreeMap<u64, Vec<TokenMetadata>> = serde_json::from_str(json)
            .map_err(|e| EthError::Config(format!("invalid token table: {e}")))?;
        let mut registry = Self::new();
        for (chain_id, list) in tokens {
            for token in list {
                registry.insert(chain_id, token);
            }
        }
        Ok(registry)
    }

    /// Adds a token, replacing an existing entry with the same address.
    pub fn insert(&mut self, chain_id: u64, token: TokenMetadata) {
        let list = self.tokens.entry(chain_id).or_default();
        match list.iter_mut().find(|t| t.address == token.address) {
            Some(existing) => *existing = token,
            None => list.push(token),
        }
    }

    pub fn extend(&mut self, other: TokenRegistry) {
        for (chain_id, list) in other.tokens {
            for token in list {
                self.insert(chain_id, token);
            }
        }
    }

    pub fn tokens(&self, chain_id: u64) -> &[TokenMetadata] {
        self.tokens.get(&chain_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, chain_id: u64, address: &Address) -> Option<&TokenMetadata> {
        self.tokens(chain_id).iter().find(|t| t.address == *address)
    }

    /// Case-insensitive symbol lookup.
    pub fn find_by_symbol(&self, chain_id: u64, symbol: &str) -> Option<&TokenMetadata> {
        self.tokens(chain_id)
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.tokens.keys().copied()
    }
}
