use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a wallet connection.
///
/// ```text
/// disconnected -> connecting -> awaiting_approval -> connected
/// connected -> reconnecting -> connected | disconnected
/// any -> error -> disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingApproval,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    /// A pairing or chain-switch round trip is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::AwaitingApproval | ConnectionState::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingApproval => "awaiting_approval",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// One published transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
    pub session_id: Option<String>,
    /// Error message when entering [`ConnectionState::Error`].
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_states() {
        assert!(ConnectionState::Connecting.is_busy());
        assert!(ConnectionState::AwaitingApproval.is_busy());
        assert!(ConnectionState::Reconnecting.is_busy());
        assert!(!ConnectionState::Connected.is_busy());
        assert!(!ConnectionState::Error.is_busy());
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ConnectionState::AwaitingApproval.to_string(), "awaiting_approval");
        assert_eq!(
            serde_json::to_string(&ConnectionState::AwaitingApproval).unwrap(),
            "\"awaiting_approval\""
        );
    }
}
