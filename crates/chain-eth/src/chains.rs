use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::EthError;

const BUILTIN_CHAINS: &str = include_str!("../data/chains.json");

/// Definition of an EVM-compatible blockchain network.
///
/// Identity is the chain id alone: two `Chain` values with the same
/// `chain_id` compare equal and hash identically even if their RPC URLs or
/// display names differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    #[serde(default)]
    pub backup_rpc_urls: Vec<String>,
    pub native_symbol: String,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
    #[serde(default)]
    pub is_testnet: bool,
    #[serde(default = "default_true")]
    pub supports_eip1559: bool,
    #[serde(default = "default_block_time")]
    pub block_time_seconds: u64,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

fn default_native_decimals() -> u8 {
    18
}

fn default_true() -> bool {
    true
}

fn default_block_time() -> u64 {
    12
}

impl Chain {
    /// Primary RPC URL followed by the backups, in failover order.
    pub fn rpc_urls(&self) -> Vec<String> {
        std::iter::once(self.rpc_url.clone())
            .chain(self.backup_rpc_urls.iter().cloned())
            .collect()
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{tx_hash}", base.trim_end_matches('/')))
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id
    }
}

impl Eq for Chain {}

impl Hash for Chain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
    }
}

/// Chain table keyed by chain id.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<Chain>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<Chain>) -> Self {
        let mut registry = Self::default();
        for c in chains {
            registry.insert(c);
        }
        registry
    }

    /// Built-in networks, from `data/chains.json`.
    pub fn builtin() -> Result<Self, EthError> {
        Self::from_json(BUILTIN_CHAINS)
    }

    /// Parses a JSON array of chain definitions.
    pub fn from_json(json: &str) -> Result<Self, EthError> {
        let chains: Vec<Chain> = serde_json::from_str(json)
            .map_err(|e| EthError::Config(format!("invalid chain table: {e}")))?;
        Ok(Self::new(chains))
    }

    /// Adds a chain, replacing any existing entry with the same chain id.
    pub fn insert(&mut self, chain: Chain) {
        match self.chains.iter_mut().find(|c| **c == chain) {
            Some(existing) => *existing = chain,
            None => self.chains.push(chain),
        }
    }

    /// Merges `other` into this registry; entries in `other` win.
    pub fn extend(&mut self, other: ChainRegistry) {
        for c in other.chains {
            self.insert(c);
        }
    }

    pub fn get(&self, chain_id: u64) -> Option<&Chain> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Like [`ChainRegistry::get`] but fails with [`EthError::UnsupportedChain`].
    pub fn require(&self, chain_id: u64) -> Result<&Chain, EthError> {
        self.get(chain_id).ok_or(EthError::UnsupportedChain(chain_id))
    }

    pub fn all(&self) -> &[Chain] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
