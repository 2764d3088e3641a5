//! JSON-RPC transports.
//!
//! A transport sends one request to one endpoint. Failover, caching and
//! timeouts are layered on top by [`crate::provider::RpcProvider`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::RpcError;

/// A single JSON-RPC endpoint.
#[async_trait]
pub trait JsonRpcClient: Send + Sync + Debug {
    /// Endpoint URL, used in logs and error context.
    fn endpoint(&self) -> &str;

    /// Sends `method(params)` and returns the `result` member of the response.
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Splits a JSON-RPC response into its result or error.
///
/// A missing `result` with no `error` is read as `null`, which is how nodes
/// answer e.g. `eth_getTransactionReceipt` for an unknown hash.
pub(crate) fn parse_response(endpoint: &str, body: Value) -> Result<Value, RpcError> {
    let envelope: ResponseEnvelope = serde_json::from_value(body)
        .map_err(|e| RpcError::transport(endpoint, format!("malformed response: {e}")))?;
    if let Some(err) = envelope.error {
        return Err(RpcError::Rpc { code: err.code, message: err.message, data: err.data });
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}

pub(crate) fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// JSON-RPC over HTTP POST.
#[derive(Debug)]
pub struct HttpTransport {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    /// Shares a connection pool with other transports.
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self { url: url.into(), client, next_id: AtomicU64::new(1) }
    }
}

#[async_trait]
impl JsonRpcClient for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(endpoint = %self.url, method, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&request_body(id, method, params))
            .send()
            .await
            .map_err(|e| RpcError::transport(&self.url, e))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::transport(&self.url, format!("http status {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::transport(&self.url, format!("invalid json body: {e}")))?;
        parse_response(&self.url, body)
    }
}
