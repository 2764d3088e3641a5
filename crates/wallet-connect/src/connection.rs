use std::sync::Arc;
use std::time::Duration;

use chain_eth::{Address, TransactionRequest};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::deeplink::{build_request_uri, parse_callback, CallbackResponse, DeepLinkLauncher};
use crate::error::ConnectError;
use crate::family::{WalletAction, WalletInfo};
use crate::pending::PendingRequests;
use crate::session::{unix_now, SessionStore, WalletSession};
use crate::state::{ConnectionState, StateChange};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Shown to the user in the wallet's approval prompt.
    pub app_name: String,
    /// Custom-scheme URI the wallet redirects back to.
    pub callback_uri: String,
    /// How long a single wallet round trip may take.
    pub request_timeout: Duration,
    /// Idle time after which a persisted session is not restored.
    pub session_ttl: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            app_name: "evmcore".into(),
            callback_uri: "evmcore://wallet/callback".into(),
            request_timeout: Duration::from_secs(120),
            session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: ConnectionState,
    session: Option<WalletSession>,
    /// Bumped by every teardown; a pairing only completes under the
    /// generation it started in.
    generation: u64,
}

enum Wait {
    Reply(CallbackResponse),
    TimedOut,
    /// Entry dropped by `disconnect` or a session change.
    Closed,
}

/// Connection to one external wallet app, driven over deep links.
///
/// Only this type mutates the connection state. Observers take snapshots
/// with [`WalletConnection::state`] / [`WalletConnection::session`] or follow
/// every transition through [`WalletConnection::subscribe`].
///
/// Wallet replies arrive out of band: the host application forwards every
/// inbound callback URI to [`WalletConnection::handle_callback`].
#[derive(Debug)]
pub struct WalletConnection {
    wallet: WalletInfo,
    config: ConnectionConfig,
    launcher: Arc<dyn DeepLinkLauncher>,
    store: Arc<dyn SessionStore>,
    inner: Mutex<Inner>,
    pending: PendingRequests,
    events: broadcast::Sender<StateChange>,
}

impl WalletConnection {
    pub fn new(
        wallet: WalletInfo,
        launcher: Arc<dyn DeepLinkLauncher>,
        store: Arc<dyn SessionStore>,
        config: ConnectionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            wallet,
            config,
            launcher,
            store,
            inner: Mutex::new(Inner::default()),
            pending: PendingRequests::new(),
            events,
        }
    }

    pub fn wallet(&self) -> &WalletInfo {
        &self.wallet
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn session(&self) -> Option<WalletSession> {
        self.inner.lock().session.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn address(&self) -> Option<Address> {
        self.inner.lock().session.as_ref().map(|s| s.address)
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.inner.lock().session.as_ref().map(|s| s.chain_id)
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Resume a persisted session unless it has been idle longer than the
    /// configured TTL or belongs to another wallet.
    pub fn restore(&self) -> Result<Option<WalletSession>, ConnectError> {
        let Some(session) = self.store.load()? else {
            return Ok(None);
        };
        if session.wallet_id != self.wallet.id {
            debug!(stored = %session.wallet_id, wallet = %self.wallet.id, "stored session belongs to another wallet");
            return Ok(None);
        }
        if session.is_expired(unix_now(), self.config.session_ttl.as_secs()) {
            info!(wallet = %self.wallet.id, session_id = %session.session_id, "stored session expired");
            self.store.clear()?;
            return Ok(None);
        }

        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Connected => return Ok(inner.session.clone()),
            s if s.is_busy() => return Err(ConnectError::AlreadyConnecting),
            _ => {}
        }
        inner.session = Some(session.clone());
        self.transition(&mut inner, ConnectionState::Connected, None);
        Ok(Some(session))
    }

    /// Pair with the wallet on `chain_id`.
    ///
    /// Returns the existing session when already connected and fails with
    /// [`ConnectError::AlreadyConnecting`] while another pairing is in flight.
    pub async fn connect(&self, chain_id: u64) -> Result<WalletSession, ConnectError> {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.state == ConnectionState::Connected {
                if let Some(session) = inner.session.clone() {
                    return Ok(session);
                }
            }
            if inner.state.is_busy() {
                return Err(ConnectError::AlreadyConnecting);
            }
            self.transition(&mut inner, ConnectionState::Connecting, None);
            inner.generation
        };

        let id = PendingRequests::next_id();
        let payload = match self.wallet.pairing_payload(
            &id,
            chain_id,
            &self.config.app_name,
            &self.config.callback_uri,
        ) {
            Ok(payload) => payload,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected, None);
                return Err(e);
            }
        };
        let uri = self.request_uri(WalletAction::Pair, &payload);

        let installed = self.launcher.can_launch(&uri).await;
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != ConnectionState::Connecting {
                debug!(wallet = %self.wallet.id, "pairing abandoned before launch");
                return Err(ConnectError::NotConnected);
            }
            if !installed {
                info!(wallet = %self.wallet.id, "wallet not installed");
                self.transition(&mut inner, ConnectionState::Disconnected, None);
                return Err(ConnectError::WalletNotInstalled { wallet: self.wallet.name.clone() });
            }
            self.transition(&mut inner, ConnectionState::AwaitingApproval, None);
        }

        let rx = match self.dispatch(&uri, &id, None).await {
            Ok(rx) => rx,
            Err(e) => return Err(self.fail_pairing(e, generation)),
        };

        let result = match self.wait(&id, rx).await {
            Wait::Reply(CallbackResponse::Approved { result }) => result,
            Wait::Reply(CallbackResponse::Rejected { reason }) => {
                return Err(self.fail_pairing(self.rejected(reason), generation))
            }
            Wait::Reply(CallbackResponse::Error { message }) => {
                return Err(self.fail_pairing(self.wallet_error(message), generation))
            }
            Wait::TimedOut => return Err(self.fail_pairing(self.timeout_error(), generation)),
            Wait::Closed => return Err(ConnectError::NotConnected),
        };

        let session = match self.session_from_pairing(&result, chain_id) {
            Ok(session) => session,
            Err(e) => return Err(self.fail_pairing(e, generation)),
        };
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != ConnectionState::AwaitingApproval {
                return Err(ConnectError::NotConnected);
            }
            inner.session = Some(session.clone());
            self.transition(&mut inner, ConnectionState::Connected, None);
        }
        info!(
            wallet = %self.wallet.id,
            address = %session.address,
            chain_id = session.chain_id,
            session_id = %session.session_id,
            "wallet connected"
        );
        self.persist(&session);
        Ok(session)
    }

    /// `personal_sign` over `message`; returns the signature as sent by the wallet.
    pub async fn sign_message(&self, message: &[u8]) -> Result<String, ConnectError> {
        let result = self
            .request(WalletAction::Sign, |id, session| {
                Ok(self.wallet.sign_message_payload(id, &session.session_id, &session.address, message))
            })
            .await?;
        self.result_string(&result, &["signature"])
    }

    /// EIP-712 `eth_signTypedData_v4`.
    pub async fn sign_typed_data(&self, typed_data: &Value) -> Result<String, ConnectError> {
        let result = self
            .request(WalletAction::Sign, |id, session| {
                self.wallet
                    .sign_typed_data_payload(id, &session.session_id, &session.address, typed_data)
            })
            .await?;
        self.result_string(&result, &["signature"])
    }

    /// Hand `tx` to the wallet for signing and broadcast; returns the tx hash.
    ///
    /// `from` and `chain_id` default to the session's account and chain.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, ConnectError> {
        let result = self
            .request(WalletAction::Transaction, |id, session| {
                let mut tx = tx.clone();
                tx.from.get_or_insert(session.address);
                tx.chain_id.get_or_insert(session.chain_id);
                Ok(self.wallet.transaction_payload(id, &session.session_id, &tx))
            })
            .await?;
        self.result_string(&result, &["hash", "transactionHash", "txHash"])
    }

    /// Ask the wallet to move the session to `chain_id`.
    ///
    /// This is a full wallet round trip. Local state only changes once the
    /// wallet approves; a rejection leaves the session on its old chain.
    pub async fn switch_chain(&self, chain_id: u64) -> Result<WalletSession, ConnectError> {
        let session = {
            let mut inner = self.inner.lock();
            let session = match (inner.state, inner.session.clone()) {
                (ConnectionState::Connected, Some(session)) => session,
                _ => return Err(ConnectError::NotConnected),
            };
            if session.chain_id == chain_id {
                return Ok(session);
            }
            if session.rejects_chain(chain_id) {
                return Err(ConnectError::ChainNotSupported { chain_id });
            }
            self.wallet.check_chain(chain_id)?;
            self.transition(&mut inner, ConnectionState::Reconnecting, None);
            session
        };
        let session_id = session.session_id.as_str();

        let id = PendingRequests::next_id();
        let payload = match self.wallet.switch_chain_payload(&id, session_id, chain_id) {
            Ok(payload) => payload,
            Err(e) => {
                self.resume(session_id);
                return Err(e);
            }
        };
        let uri = self.request_uri(WalletAction::Pair, &payload);
        let rx = match self.dispatch(&uri, &id, Some(session_id.to_string())).await {
            Ok(rx) => rx,
            Err(e) => {
                self.resume(session_id);
                return Err(e);
            }
        };

        let result = match self.wait(&id, rx).await {
            Wait::Reply(CallbackResponse::Approved { result }) => result,
            Wait::Reply(CallbackResponse::Rejected { reason }) => {
                self.resume(session_id);
                return Err(self.rejected(reason));
            }
            Wait::Reply(CallbackResponse::Error { message }) => {
                self.resume(session_id);
                return Err(self.wallet_error(message));
            }
            Wait::TimedOut => return Err(self.fail(self.timeout_error(), session_id)),
            Wait::Closed => return Err(ConnectError::NotConnected),
        };
        let new_chain = result.get("chainId").and_then(parse_chain_id).unwrap_or(chain_id);

        let updated = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Reconnecting {
                return Err(ConnectError::NotConnected);
            }
            let current = match inner.session.as_mut() {
                Some(s) if s.session_id == session_id => s,
                _ => return Err(ConnectError::NotConnected),
            };
            current.chain_id = new_chain;
            current.last_active_at = unix_now();
            let updated = current.clone();
            self.transition(&mut inner, ConnectionState::Connected, None);
            updated
        };
        info!(wallet = %self.wallet.id, from = session.chain_id, to = new_chain, "wallet switched chain");
        self.persist(&updated);
        Ok(updated)
    }

    /// Reset to disconnected and tell the wallet, best effort.
    ///
    /// Every in-flight round trip fails with [`ConnectError::NotConnected`].
    pub async fn disconnect(&self) {
        let session = {
            let mut inner = self.inner.lock();
            let session = inner.session.take();
            inner.generation += 1;
            self.transition(&mut inner, ConnectionState::Disconnected, None);
            session
        };
        let dropped = self.pending.clear();
        if dropped > 0 {
            debug!(wallet = %self.wallet.id, dropped, "abandoned in-flight wallet requests");
        }
        if let Err(e) = self.store.clear() {
            warn!(wallet = %self.wallet.id, error = %e, "failed to clear stored session");
        }

        if let Some(session) = session {
            let payload = self.wallet.disconnect_payload(&PendingRequests::next_id(), &session.session_id);
            let uri = self.request_uri(WalletAction::Disconnect, &payload);
            if !self.launcher.launch(&uri).await {
                debug!(wallet = %self.wallet.id, "disconnect notification not delivered");
            }
            info!(wallet = %self.wallet.id, session_id = %session.session_id, "wallet disconnected");
        }
    }

    /// Route an inbound callback URI to its waiting request.
    ///
    /// Returns `false` for malformed URIs, unknown or expired correlation
    /// ids, and replies issued under a session that is no longer current.
    pub fn handle_callback(&self, uri: &str) -> bool {
        let callback = match parse_callback(uri, &self.config.callback_uri) {
            Ok(callback) => callback,
            Err(e) => {
                warn!(error = %e, "ignoring malformed wallet callback");
                return false;
            }
        };
        let Some(entry) = self.pending.take(&callback.id) else {
            debug!(id = %callback.id, "ignoring stray wallet callback");
            return false;
        };
        if let Some(expected) = entry.session_id.as_deref() {
            let current = self.inner.lock().session.as_ref().map(|s| s.session_id.clone());
            if current.as_deref() != Some(expected) {
                warn!(id = %callback.id, session_id = expected, "ignoring callback for a stale session");
                return false;
            }
        }
        entry.reply.send(callback.response).is_ok()
    }

    async fn request<F>(&self, action: WalletAction, build: F) -> Result<Value, ConnectError>
    where
        F: FnOnce(&str, &WalletSession) -> Result<Value, ConnectError>,
    {
        let session = {
            let inner = self.inner.lock();
            match (inner.state, inner.session.clone()) {
                (ConnectionState::Connected, Some(session)) => session,
                _ => return Err(ConnectError::NotConnected),
            }
        };
        let session_id = session.session_id.as_str();

        let id = PendingRequests::next_id();
        let payload = build(&id, &session)?;
        let uri = self.request_uri(action, &payload);
        let rx = self.dispatch(&uri, &id, Some(session_id.to_string())).await?;

        match self.wait(&id, rx).await {
            Wait::Reply(response) => {
                self.touch(session_id);
                match response {
                    CallbackResponse::Approved { result } => Ok(result),
                    CallbackResponse::Rejected { reason } => Err(self.rejected(reason)),
                    CallbackResponse::Error { message } => Err(self.wallet_error(message)),
                }
            }
            Wait::TimedOut => Err(self.fail(self.timeout_error(), session_id)),
            Wait::Closed => Err(ConnectError::NotConnected),
        }
    }

    fn request_uri(&self, action: WalletAction, payload: &Value) -> String {
        build_request_uri(&self.wallet.scheme, action, payload, &self.config.callback_uri)
    }

    /// Register the correlation id, then hand the URI to the OS.
    async fn dispatch(
        &self,
        uri: &str,
        id: &str,
        session_id: Option<String>,
    ) -> Result<oneshot::Receiver<CallbackResponse>, ConnectError> {
        let rx = self.pending.register(id, session_id);
        debug!(wallet = %self.wallet.id, id, "launching wallet");
        if !self.launcher.launch(uri).await {
            self.pending.cancel(id);
            return Err(ConnectError::LaunchFailed { wallet: self.wallet.name.clone() });
        }
        Ok(rx)
    }

    async fn wait(&self, id: &str, rx: oneshot::Receiver<CallbackResponse>) -> Wait {
        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(response)) => Wait::Reply(response),
            Ok(Err(_)) => Wait::Closed,
            Err(_) => {
                self.pending.cancel(id);
                warn!(wallet = %self.wallet.id, id, "wallet request timed out");
                Wait::TimedOut
            }
        }
    }

    fn transition(&self, inner: &mut Inner, next: ConnectionState, reason: Option<String>) {
        if inner.state == next {
            return;
        }
        let change = StateChange {
            previous: inner.state,
            current: next,
            session_id: inner.session.as_ref().map(|s| s.session_id.clone()),
            reason,
        };
        inner.state = next;
        debug!(wallet = %self.wallet.id, from = %change.previous, to = %next, "wallet state");
        // No subscribers is fine.
        let _ = self.events.send(change);
    }

    fn set_state(&self, next: ConnectionState, reason: Option<String>) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, next, reason);
    }

    /// error -> disconnected, only if `session_id` is still the current session.
    fn fail(&self, err: ConnectError, session_id: &str) -> ConnectError {
        self.tear_down(err, true, |inner| {
            inner.session.as_ref().is_some_and(|s| s.session_id == session_id)
        })
    }

    /// Like [`Self::fail`] for a pairing, which owns the state only while
    /// no teardown has happened since it started.
    fn fail_pairing(&self, err: ConnectError, generation: u64) -> ConnectError {
        self.tear_down(err, false, |inner| inner.generation == generation)
    }

    fn tear_down(
        &self,
        err: ConnectError,
        clear_store: bool,
        owns: impl FnOnce(&Inner) -> bool,
    ) -> ConnectError {
        {
            let mut inner = self.inner.lock();
            if !owns(&inner) {
                return err;
            }
            self.transition(&mut inner, ConnectionState::Error, Some(err.to_string()));
            inner.session = None;
            inner.generation += 1;
            self.transition(&mut inner, ConnectionState::Disconnected, None);
        }
        self.pending.clear();
        if clear_store {
            if let Err(e) = self.store.clear() {
                warn!(wallet = %self.wallet.id, error = %e, "failed to clear stored session");
            }
        }
        err
    }

    /// reconnecting -> connected after an abandoned chain switch.
    fn resume(&self, session_id: &str) {
        let mut inner = self.inner.lock();
        let same = inner.session.as_ref().is_some_and(|s| s.session_id == session_id);
        if same && inner.state == ConnectionState::Reconnecting {
            self.transition(&mut inner, ConnectionState::Connected, None);
        }
    }

    fn touch(&self, session_id: &str) {
        let updated = {
            let mut inner = self.inner.lock();
            match inner.session.as_mut() {
                Some(s) if s.session_id == session_id => {
                    s.last_active_at = unix_now();
                    s.clone()
                }
                _ => return,
            }
        };
        self.persist(&updated);
    }

    fn persist(&self, session: &WalletSession) {
        if let Err(e) = self.store.save(session) {
            warn!(wallet = %self.wallet.id, error = %e, "failed to persist session");
        }
    }

    fn rejected(&self, reason: Option<String>) -> ConnectError {
        ConnectError::UserRejected {
            wallet: self.wallet.name.clone(),
            reason: reason.unwrap_or_else(|| "user rejected the request".into()),
        }
    }

    fn wallet_error(&self, message: String) -> ConnectError {
        ConnectError::Wallet { wallet: self.wallet.name.clone(), message }
    }

    fn timeout_error(&self) -> ConnectError {
        ConnectError::ConnectionTimeout {
            wallet: self.wallet.name.clone(),
            timeout_secs: self.config.request_timeout.as_secs(),
        }
    }

    fn result_string(&self, result: &Value, keys: &[&str]) -> Result<String, ConnectError> {
        if let Some(s) = result.as_str() {
            return Ok(s.to_string());
        }
        keys.iter()
            .find_map(|k| result.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| ConnectError::InvalidCallback(format!("expected one of {keys:?} in {result}")))
    }

    fn session_from_pairing(&self, result: &Value, requested_chain: u64) -> Result<WalletSession, ConnectError> {
        let address = result
            .get("address")
            .and_then(Value::as_str)
            .or_else(|| result.get("accounts").and_then(|a| a.get(0)).and_then(Value::as_str))
            .ok_or_else(|| ConnectError::InvalidCallback("pairing result has no address".into()))?;
        let address = Address::parse(address)
            .map_err(|e| ConnectError::InvalidCallback(format!("pairing address: {e}")))?;

        let session_id = result
            .get("sessionId")
            .or_else(|| result.get("topic"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(PendingRequests::next_id);

        let supported_chain_ids = result
            .get("supportedChainIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(parse_chain_id).collect());
        let capabilities = result.get("capabilities").and_then(Value::as_array).map(|caps| {
            caps.iter().filter_map(Value::as_str).map(str::to_string).collect()
        });

        let now = unix_now();
        Ok(WalletSession {
            address,
            chain_id: result.get("chainId").and_then(parse_chain_id).unwrap_or(requested_chain),
            wallet_id: self.wallet.id.clone(),
            session_id,
            connected_at: now,
            last_active_at: now,
            supported_chain_ids,
            capabilities,
        })
    }
}

/// Chain ids arrive as numbers, `0x` hex strings or decimal strings.
fn parse_chain_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}
