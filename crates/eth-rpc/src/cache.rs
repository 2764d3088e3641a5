use dashmap::DashMap;
use serde_json::Value;

/// Methods whose answer changes with every block or mutates state. They are
/// never served from, or stored in, the cache.
const UNCACHEABLE: &[&str] = &[
    "eth_sendRawTransaction",
    "eth_sendTransaction",
    "eth_getTransactionCount",
    "eth_blockNumber",
    "eth_getTransactionReceipt",
    "eth_gasPrice",
    "eth_maxPriorityFeePerGas",
    "eth_estimateGas",
    "eth_feeHistory",
];

/// Response cache keyed by (method, params).
///
/// The block tag is part of `params` for every state query, so it is
/// part of the key. Queries against the `pending` block are never cached.
/// Entries live until [`ResponseCache::clear`].
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, Value>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cacheable(method: &str) -> bool {
        !UNCACHEABLE.contains(&method)
    }

    /// [`Self::is_cacheable`] plus the block tag: `pending` moves with the mempool.
    pub fn is_cacheable_request(method: &str, params: &Value) -> bool {
        let pending = match params {
            Value::Array(items) => items.iter().any(|p| p.as_str() == Some("pending")),
            Value::String(tag) => tag == "pending",
            _ => false,
        };
        !pending && Self::is_cacheable(method)
    }

    fn key(method: &str, params: &Value) -> String {
        format!("{method}:{params}")
    }

    pub fn get(&self, method: &str, params: &Value) -> Option<Value> {
        if !Self::is_cacheable_request(method, params) {
            return None;
        }
        self.entries.get(&Self::key(method, params)).map(|v| v.value().clone())
    }

    pub fn insert(&self, method: &str, params: &Value, value: Value) {
        if Self::is_cacheable_request(method, params) {
            self.entries.insert(Self::key(method, params), value);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
