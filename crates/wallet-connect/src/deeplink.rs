//! Deep-link URIs in both directions.
//!
//! Outbound: `{scheme}{action}?data=<base64url(json)>&redirect=<urlencoded callback>`.
//! Inbound: `{callback}?id=<correlation id>&data=<base64url(json)>` where the
//! JSON is a [`CallbackResponse`].

use std::fmt::Debug;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;
use url::Url;

use crate::error::ConnectError;
use crate::family::WalletAction;

/// Hands a URI to the operating system.
///
/// `can_launch` answers whether some installed app claims the scheme;
/// `launch` reports whether the hand-off happened.
#[async_trait]
pub trait DeepLinkLauncher: Send + Sync + Debug {
    async fn can_launch(&self, uri: &str) -> bool;
    async fn launch(&self, uri: &str) -> bool;
}

/// What the wallet sent back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallbackResponse {
    Approved {
        #[serde(default)]
        result: Value,
    },
    Rejected {
        #[serde(default)]
        reason: Option<String>,
    },
    Error {
        message: String,
    },
}

/// A parsed inbound callback.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCallback {
    pub id: String,
    pub response: CallbackResponse,
}

/// A parsed outbound request, as a wallet would see it.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletRequest {
    pub action: String,
    pub payload: Value,
    pub redirect: String,
}

impl WalletRequest {
    pub fn id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }
}

fn encode_data(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}

fn decode_data(data: &str) -> Result<Value, ConnectError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|e| ConnectError::InvalidCallback(format!("data is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ConnectError::InvalidCallback(format!("data is not json: {e}")))
}

pub fn build_request_uri(scheme: &str, action: WalletAction, payload: &Value, redirect: &str) -> String {
    let redirect: String = form_urlencoded::byte_serialize(redirect.as_bytes()).collect();
    format!("{scheme}{}?data={}&redirect={redirect}", action.as_str(), encode_data(payload))
}

pub fn build_callback_uri(callback: &str, id: &str, response: &CallbackResponse) -> String {
    let value = serde_json::to_value(response).unwrap_or(Value::Null);
    let id: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
    format!("{callback}?id={id}&data={}", encode_data(&value))
}

fn split_query(uri: &str) -> Result<(Url, String), ConnectError> {
    let url = Url::parse(uri).map_err(|e| ConnectError::InvalidCallback(format!("{uri}: {e}")))?;
    let base = uri.split('?').next().unwrap_or(uri).to_string();
    Ok((url, base))
}

/// Parse a callback URI addressed to `callback`.
pub fn parse_callback(uri: &str, callback: &str) -> Result<InboundCallback, ConnectError> {
    let (url, base) = split_query(uri)?;
    if base.trim_end_matches('/') != callback.trim_end_matches('/') {
        return Err(ConnectError::InvalidCallback(format!("not addressed to {callback}: {uri}")));
    }

    let mut id = None;
    let mut data = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "id" => id = Some(value.into_owned()),
            "data" => data = Some(value.into_owned()),
            _ => {}
        }
    }

    let id = id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConnectError::InvalidCallback("missing id".into()))?;
    let data = data.ok_or_else(|| ConnectError::InvalidCallback("missing data".into()))?;
    let response = serde_json::from_value(decode_data(&data)?)
        .map_err(|e| ConnectError::InvalidCallback(format!("unexpected callback shape: {e}")))?;

    Ok(InboundCallback { id, response })
}

/// Parse an outbound request URI built with `scheme`.
pub fn parse_request(uri: &str, scheme: &str) -> Result<WalletRequest, ConnectError> {
    let rest = uri
        .strip_prefix(scheme)
        .ok_or_else(|| ConnectError::InvalidCallback(format!("not a {scheme} uri: {uri}")))?;
    let (action, query) = rest.split_once('?').unwrap_or((rest, ""));

    let mut data = None;
    let mut redirect = String::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "data" => data = Some(value.into_owned()),
            "redirect" => redirect = value.into_owned(),
            _ => {}
        }
    }
    let data = data.ok_or_else(|| ConnectError::InvalidCallback("missing data".into()))?;

    Ok(WalletRequest { action: action.to_string(), payload: decode_data(&data)?, redirect })
}
