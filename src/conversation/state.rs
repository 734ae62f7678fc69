//! Orchestrator states and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Orchestrator state machine
///
/// ```text
/// [Init] -> [Handshaking] -> [Seeding] -> [Exchanging] -> [Done]
///    \            \              \              \
///     `------------`--------------`--------------`--> [Aborted]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    /// Nothing has happened yet
    Init,
    /// Identity exchange in progress
    Handshaking,
    /// Initial packet being routed
    Seeding,
    /// Alternating exchange
    Exchanging,
    /// Round budget exhausted without failure
    Done,
    /// Stopped early
    Aborted,
}

impl ConversationState {
    /// Check for a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationState::Done | ConversationState::Aborted)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConversationState::Init => "INIT",
            ConversationState::Handshaking => "HANDSHAKING",
            ConversationState::Seeding => "SEEDING",
            ConversationState::Exchanging => "EXCHANGING",
            ConversationState::Done => "DONE",
            ConversationState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Why a conversation was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortReason {
    /// Identity exchange failed in either direction
    AuthFailed,
    /// A peer returned nothing or an ERROR packet
    PeerUnresponsive,
    /// Operator interrupt
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AbortReason::AuthFailed => "AUTH_FAILED",
            AbortReason::PeerUnresponsive => "PEER_UNRESPONSIVE",
            AbortReason::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation flag, checked between turns.
///
/// Clones share the flag, so a signal handler can hold one while the
/// conversation holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConversationState::Done.is_terminal());
        assert!(ConversationState::Aborted.is_terminal());
        assert!(!ConversationState::Exchanging.is_terminal());
        assert_eq!(AbortReason::PeerUnresponsive.to_string(), "PEER_UNRESPONSIVE");
    }
}
