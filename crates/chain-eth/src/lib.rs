//! EVM contract-interaction primitives.
//!
//! This crate provides:
//! - Ethereum ABI encoding and decoding (selectors, topics, head/tail tuples)
//! - Addresses with EIP-55 checksums
//! - Calldata and event codecs for ERC-20, ERC-721, ERC-1155 and Multicall3
//! - Chain and token tables loaded from JSON
//! - Token amount formatting and parsing
//!
//! Nothing here performs I/O; the RPC and wallet layers live in `eth-rpc`
//! and `wallet-connect`.

pub mod abi;
pub mod address;
pub mod chains;
pub mod decode;
pub mod erc1155;
pub mod erc20;
pub mod erc721;
pub mod error;
pub mod log;
pub mod multicall;
pub mod tokens;
pub mod transaction;
pub mod units;

pub use address::Address;
pub use alloy_primitives::{I256, U256};
pub use chains::{Chain, ChainRegistry};
pub use error::EthError;
pub use log::Log;
pub use tokens::{TokenMetadata, TokenRegistry};
pub use transaction::{TransactionRequest, TxReceipt, TxStatus};
