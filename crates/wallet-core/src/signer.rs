use std::fmt::Debug;

use async_trait::async_trait;
use chain_eth::{Address, TransactionRequest};
use wallet_connect::WalletConnection;

use crate::error::WalletError;

/// Something that can get a transaction signed and broadcast.
///
/// Keys never live in this process; the production implementation is the
/// deep-link [`WalletConnection`].
#[async_trait]
pub trait TransactionSigner: Send + Sync + Debug {
    /// Account of the active session, `None` when not connected.
    fn address(&self) -> Option<Address>;

    fn chain_id(&self) -> Option<u64>;

    /// Returns the transaction hash.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, WalletError>;
}

#[async_trait]
impl TransactionSigner for WalletConnection {
    fn address(&self) -> Option<Address> {
        if self.is_connected() {
            WalletConnection::address(self)
        } else {
            None
        }
    }

    fn chain_id(&self) -> Option<u64> {
        if self.is_connected() {
            WalletConnection::chain_id(self)
        } else {
            None
        }
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, WalletError> {
        Ok(WalletConnection::send_transaction(self, tx).await?)
    }
}
