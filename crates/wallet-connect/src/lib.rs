//! Out-of-process wallet connection over deep links.
//!
//! [`WalletConnection`] pairs with an installed wallet app, forwards
//! signing and transaction requests to it and waits for the app to call
//! back into the host. Key custody never leaves the wallet.

pub mod connection;
pub mod deeplink;
pub mod error;
pub mod family;
pub mod pending;
pub mod session;
pub mod state;

pub use connection::{ConnectionConfig, WalletConnection};
pub use deeplink::{CallbackResponse, DeepLinkLauncher};
pub use error::ConnectError;
pub use family::{WalletFamily, WalletInfo};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, WalletSession};
pub use state::{ConnectionState, StateChange};
