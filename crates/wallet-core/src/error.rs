use chain_eth::units::format_amount;
use chain_eth::{EthError, U256};
use eth_rpc::RpcError;
use thiserror::Error;
use wallet_connect::ConnectError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Eth(#[from] EthError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Insufficient balance: need {} {symbol}, have {} {symbol}", human(.required, .decimals), human(.available, .decimals))]
    InsufficientBalance {
        required: U256,
        available: U256,
        decimals: u8,
        symbol: String,
    },

    #[error("Insufficient allowance: need {} {symbol}, approved {} {symbol}", human(.required, .decimals), human(.available, .decimals))]
    InsufficientAllowance {
        required: U256,
        available: U256,
        decimals: u8,
        symbol: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    Config(String),
}

fn human(amount: &U256, decimals: &u8) -> String {
    format_amount(*amount, *decimals, None)
}

impl WalletError {
    /// True when the failure came from the user or the wallet app rather
    /// than from this process or the network.
    pub fn is_user_decision(&self) -> bool {
        matches!(
            self,
            WalletError::Connect(
                ConnectError::UserRejected { .. }
                    | ConnectError::WalletNotInstalled { .. }
                    | ConnectError::ConnectionTimeout { .. }
            )
        )
    }
}
