use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::oneshot;

use crate::deeplink::CallbackResponse;

/// A wallet round trip waiting for its callback.
#[derive(Debug)]
pub struct PendingRequest {
    /// Session the request was issued under; `None` while pairing.
    pub session_id: Option<String>,
    pub reply: oneshot::Sender<CallbackResponse>,
}

/// Outstanding deep-link requests keyed by correlation id.
///
/// The waiter owns the timeout: on expiry it calls [`PendingRequests::cancel`]
/// so a late callback finds nothing to resolve.
#[derive(Debug, Default)]
pub struct PendingRequests {
    inner: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh 128-bit correlation id, hex encoded.
    pub fn next_id() -> String {
        hex::encode(rand::thread_rng().gen::<[u8; 16]>())
    }

    pub fn register(&self, id: &str, session_id: Option<String>) -> oneshot::Receiver<CallbackResponse> {
        let (reply, rx) = oneshot::channel();
        self.inner.lock().insert(id.to_string(), PendingRequest { session_id, reply });
        rx
    }

    pub fn take(&self, id: &str) -> Option<PendingRequest> {
        self.inner.lock().remove(id)
    }

    pub fn cancel(&self, id: &str) -> bool {
        self.take(id).is_some()
    }

    /// Drop every entry; waiters observe a closed channel.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.len();
        inner.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
