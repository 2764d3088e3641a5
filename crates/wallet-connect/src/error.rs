use thiserror::Error;

/// Outcomes of the wallet deep-link protocol.
///
/// Rejections, timeouts and missing wallets reflect a user or environment
/// decision and are never retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("wallet not connected")]
    NotConnected,

    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("wallet not installed: {wallet}")]
    WalletNotInstalled { wallet: String },

    #[error("request rejected in {wallet}: {reason}")]
    UserRejected { wallet: String, reason: String },

    #[error("{wallet} did not respond within {timeout_secs}s")]
    ConnectionTimeout { wallet: String, timeout_secs: u64 },

    #[error("chain not supported: {chain_id}")]
    ChainNotSupported { chain_id: u64 },

    #[error("{wallet} does not support {operation}")]
    Unsupported { wallet: String, operation: String },

    #[error("failed to open {wallet}")]
    LaunchFailed { wallet: String },

    #[error("{wallet} returned an error: {message}")]
    Wallet { wallet: String, message: String },

    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    #[error("session store error: {0}")]
    Session(String),
}
