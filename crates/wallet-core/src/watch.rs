use std::sync::Arc;
use std::time::Duration;

use chain_eth::decode::decode_uint256;
use chain_eth::{erc20, Address, U256};
use eth_rpc::{BlockTag, RpcProvider};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::WalletError;

/// What balance to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    Native,
    Erc20(Address),
}

/// Handle to a background balance poll. The poll stops when this is dropped.
#[derive(Debug)]
pub struct BalanceWatch {
    rx: watch::Receiver<Option<U256>>,
    task: JoinHandle<()>,
}

impl BalanceWatch {
    /// Last observed balance, `None` until the first successful poll.
    pub fn current(&self) -> Option<U256> {
        *self.rx.borrow()
    }

    /// Waits for the next change. `None` once the poll has stopped.
    pub async fn changed(&mut self) -> Option<U256> {
        self.rx.changed().await.ok()?;
        *self.rx.borrow_and_update()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<U256>> {
        self.rx.clone()
    }
}

impl Drop for BalanceWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polls `owner`'s balance every `interval` and publishes it whenever it
/// changes. Poll failures are logged and retried on the next tick.
///
/// `interval` must be non-zero.
pub fn watch_balance(
    provider: Arc<RpcProvider>,
    owner: Address,
    target: WatchTarget,
    interval: Duration,
) -> Result<BalanceWatch, WalletError> {
    if interval.is_zero() {
        return Err(WalletError::InvalidArgument("watch interval must be non-zero".into()));
    }
    let (tx, rx) = watch::channel(None);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            match fetch_balance(&provider, &owner, target).await {
                Ok(balance) => {
                    let changed = tx.send_if_modified(|current| {
                        if *current == Some(balance) {
                            return false;
                        }
                        *current = Some(balance);
                        true
                    });
                    if changed {
                        debug!(%owner, ?target, %balance, "balance changed");
                    }
                }
                Err(e) => warn!(%owner, ?target, error = %e, "balance poll failed"),
            }
        }
        debug!(%owner, ?target, "balance watch stopped");
    });
    Ok(BalanceWatch { rx, task })
}

async fn fetch_balance(provider: &RpcProvider, owner: &Address, target: WatchTarget) -> Result<U256, WalletError> {
    match target {
        WatchTarget::Native => Ok(provider.get_balance(owner, BlockTag::Latest).await?),
        WatchTarget::Erc20(token) => {
            let data = provider.eth_call(&token, &erc20::encode_balance_of(owner), BlockTag::Latest, false).await?;
            Ok(decode_uint256(&data)?)
        }
    }
}
