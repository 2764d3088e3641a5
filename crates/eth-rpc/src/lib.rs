//! JSON-RPC access to EVM chains.
//!
//! - [`JsonRpcClient`]: one endpoint, over HTTP ([`HttpTransport`]) or
//!   WebSocket ([`WsTransport`])
//! - [`RpcProvider`]: ordered failover across a chain's endpoints, response
//!   cache, per-request timeout and typed `eth_*` helpers

pub mod cache;
pub mod error;
pub mod provider;
pub mod transport;
pub mod types;
pub mod ws;

pub use error::RpcError;
pub use provider::RpcProvider;
pub use transport::{HttpTransport, JsonRpcClient};
pub use types::{BlockTag, LogFilter, RpcReceipt};
pub use ws::WsTransport;
