use chain_eth::EthError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RpcError {
    /// JSON-RPC error envelope returned by the node.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The request never produced a JSON-RPC response (connection refused,
    /// TLS failure, HTTP 5xx, malformed body).
    #[error("transport error at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("rpc timeout: {method} exceeded {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Encoding(#[from] EthError),

    #[error("no rpc endpoints configured")]
    NoEndpoints,
}

impl RpcError {
    /// Whether the failure happened below the JSON-RPC layer and is worth
    /// retrying against another endpoint.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport { .. } | RpcError::Timeout { .. })
    }

    /// Whether the node reported an `eth_call` / `eth_estimateGas` revert.
    pub fn is_revert(&self) -> bool {
        match self {
            // 3 is the standard "execution reverted" code; some nodes use -32000.
            RpcError::Rpc { code, message, .. } => {
                *code == 3 || message.to_ascii_lowercase().contains("revert")
            }
            _ => false,
        }
    }

    pub(crate) fn transport(endpoint: &str, message: impl std::fmt::Display) -> Self {
        RpcError::Transport {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }
}
