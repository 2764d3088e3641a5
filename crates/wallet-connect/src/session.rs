use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chain_eth::Address;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;

/// An approved pairing with an external wallet.
///
/// Created by a successful `connect`, mutated by chain switches (new
/// `chain_id`, same `session_id`) and activity, destroyed on disconnect or
/// expiry. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    pub address: Address,
    pub chain_id: u64,
    pub wallet_id: String,
    pub session_id: String,
    pub connected_at: u64,
    pub last_active_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_chain_ids: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

impl WalletSession {
    /// `true` when the wallet declared its chains and `chain_id` is not one of them.
    pub fn rejects_chain(&self, chain_id: u64) -> bool {
        self.supported_chain_ids
            .as_ref()
            .is_some_and(|ids| !ids.contains(&chain_id))
    }

    /// Expired once `ttl_secs` have passed without wallet activity.
    pub fn is_expired(&self, now: u64, ttl_secs: u64) -> bool {
        now.saturating_sub(self.last_active_at) > ttl_secs
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Key-value persistence for the one active session.
pub trait SessionStore: Send + Sync + Debug {
    fn save(&self, session: &WalletSession) -> Result<(), ConnectError>;
    fn load(&self) -> Result<Option<WalletSession>, ConnectError>;
    fn clear(&self) -> Result<(), ConnectError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<WalletSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &WalletSession) -> Result<(), ConnectError> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<WalletSession>, ConnectError> {
        Ok(self.slot.lock().clone())
    }

    fn clear(&self) -> Result<(), ConnectError> {
        self.slot.lock().take();
        Ok(())
    }
}

/// Session persisted as a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &WalletSession) -> Result<(), ConnectError> {
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| ConnectError::Session(format!("serialize session: {e}")))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConnectError::Session(format!("create {}: {e}", parent.display())))?;
        }
        fs::write(&self.path, json)
            .map_err(|e| ConnectError::Session(format!("write {}: {e}", self.path.display())))
    }

    fn load(&self) -> Result<Option<WalletSession>, ConnectError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConnectError::Session(format!("read {}: {e}", self.path.display())))
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ConnectError::Session(format!("parse {}: {e}", self.path.display())))
    }

    fn clear(&self) -> Result<(), ConnectError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConnectError::Session(format!("remove {}: {e}", self.path.display()))),
        }
    }
}
