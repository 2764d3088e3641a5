//! JSON-RPC over a persistent WebSocket.
//!
//! Requests are written to the socket as they arrive; a background reader
//! task routes each response back to its caller by JSON-RPC id, so many
//! requests can be in flight at once on the same connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::RpcError;
use crate::transport::{parse_response, request_body, JsonRpcClient};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingMap = Arc<Mutex<Pending>>;

/// Waiters by request id. `closed` is set once the reader has stopped, after
/// which nothing new may register.
#[derive(Default)]
struct Pending {
    waiters: HashMap<u64, oneshot::Sender<Value>>,
    closed: bool,
}

pub struct WsTransport {
    url: String,
    sink: tokio::sync::Mutex<WsSink>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: tokio::task::JoinHandle<()>,
}

impl WsTransport {
    /// Opens the socket and starts the response reader.
    pub async fn connect(url: impl Into<String>) -> Result<Self, RpcError> {
        let url = url.into();
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| RpcError::transport(&url, e))?;
        let (sink, mut source) = stream.split();
        debug!(endpoint = %url, "websocket connected");

        let pending: PendingMap = Arc::new(Mutex::new(Pending::default()));
        let reader_pending = Arc::clone(&pending);
        let reader_url = url.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(endpoint = %reader_url, error = %e, "websocket read failed");
                        break;
                    }
                };
                route_response(&reader_pending, text.as_str());
            }
            // Dropping the senders fails every waiting request.
            {
                let mut pending = reader_pending.lock();
                pending.closed = true;
                pending.waiters.clear();
            }
            debug!(endpoint = %reader_url, "websocket reader stopped");
        });

        Ok(Self {
            url,
            sink: tokio::sync::Mutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    /// Number of requests still waiting for a response.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().waiters.len()
    }

    /// `true` once the socket has closed; every later request fails at once.
    pub fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }
}

fn route_response(pending: &PendingMap, text: &str) {
    let body: Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "unparseable websocket frame");
            return;
        }
    };
    // Subscription notifications carry no id.
    let Some(id) = body.get("id").and_then(Value::as_u64) else {
        return;
    };
    let waiter = pending.lock().waiters.remove(&id);
    match waiter {
        Some(tx) => {
            let _ = tx.send(body);
        }
        None => debug!(id, "response for unknown request id"),
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("url", &self.url)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl JsonRpcClient for WsTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(RpcError::transport(&self.url, "websocket closed"));
            }
            pending.waiters.insert(id, tx);
        }

        let frame = request_body(id, method, params).to_string();
        let sent = self.sink.lock().await.send(Message::Text(frame.into())).await;
        if let Err(e) = sent {
            self.pending.lock().waiters.remove(&id);
            return Err(RpcError::transport(&self.url, e));
        }

        let body = rx
            .await
            .map_err(|_| RpcError::transport(&self.url, "websocket closed before response"))?;
        parse_response(&self.url, body)
    }
}
