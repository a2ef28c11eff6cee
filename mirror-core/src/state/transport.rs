//! Transport selection state machine.
//!
//! Decides, per session, whether HTTP polling or the push channel is the
//! authoritative frame source. Transitions return `Result` instead of
//! panicking so callers can log and carry on.

use crate::error::MirrorError;

// ── ConnectionState ──────────────────────────────────────────────

/// Frame delivery mode of a session.
///
/// ```text
///  Polling ──► Subscribing ──► PushActive
///     ▲  └───────────────────────▲   │
///     │     (push frame / ack)       │
///     └──── session change / channel lost
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// HTTP polling is authoritative. Initial state.
    #[default]
    Polling,

    /// `subscribe_recording` sent; polling still authoritative.
    Subscribing,

    /// Push delivery confirmed; polling suspended.
    PushActive,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => write!(f, "Polling"),
            Self::Subscribing => write!(f, "Subscribing"),
            Self::PushActive => write!(f, "PushActive"),
        }
    }
}

impl ConnectionState {
    /// Whether the polling loop should be running in this state.
    pub fn polls(self) -> bool {
        !matches!(self, Self::PushActive)
    }
}

// ── TransportSelector ────────────────────────────────────────────

/// Per-session subscription lifecycle.
#[derive(Debug, Default)]
pub struct TransportSelector {
    state: ConnectionState,
    /// Session named in the outstanding subscription, if any.
    subscribed: Option<String>,
}

impl TransportSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a subscription is outstanding or confirmed.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.is_some()
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Subscribing`.
    ///
    /// Valid from: `Polling`, with a connected channel and a session.
    /// Returns `Ok(false)` for a repeated call while a subscription is
    /// already outstanding or confirmed; the caller must then not send
    /// another subscribe message.
    pub fn begin_subscribe(
        &mut self,
        session_id: &str,
        channel_connected: bool,
    ) -> Result<bool, MirrorError> {
        if session_id.is_empty() {
            return Err(MirrorError::NoSession);
        }
        if !channel_connected {
            return Err(MirrorError::NotConnected);
        }
        match self.state {
            ConnectionState::Polling => {
                self.state = ConnectionState::Subscribing;
                self.subscribed = Some(session_id.to_string());
                Ok(true)
            }
            ConnectionState::Subscribing | ConnectionState::PushActive => Ok(false),
        }
    }

    /// Transition to `PushActive`.
    ///
    /// Valid from: `Polling`, `Subscribing`. Triggered by the first
    /// decoded push frame or the subscription ack, whichever comes
    /// first. Returns `true` only on the transition itself, so the
    /// poller is cancelled exactly once.
    pub fn confirm(&mut self, session_id: &str) -> bool {
        match self.state {
            ConnectionState::Polling | ConnectionState::Subscribing => {
                self.state = ConnectionState::PushActive;
                self.subscribed.get_or_insert_with(|| session_id.to_string());
                true
            }
            ConnectionState::PushActive => false,
        }
    }

    /// Transition back to `Polling` after the subscribe message could
    /// not be sent.
    ///
    /// Valid from: `Subscribing`.
    pub fn subscribe_failed(&mut self) -> Result<(), MirrorError> {
        match self.state {
            ConnectionState::Subscribing => {
                self.state = ConnectionState::Polling;
                self.subscribed = None;
                Ok(())
            }
            _ => Err(MirrorError::InvalidTransition(
                "cannot fail subscribe: not in Subscribing state",
            )),
        }
    }

    /// The push channel dropped. Force-reset to `Polling` and return the
    /// state that was left, so the caller can restart polling if it had
    /// been suspended.
    pub fn channel_lost(&mut self) -> ConnectionState {
        self.subscribed = None;
        std::mem::take(&mut self.state)
    }

    /// Session ended. Reset to `Polling` and return the session whose
    /// subscription must be withdrawn, if any.
    pub fn teardown(&mut self) -> Option<String> {
        self.state = ConnectionState::Polling;
        self.subscribed.take()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut sel = TransportSelector::new();
        assert_eq!(sel.state(), ConnectionState::Polling);

        assert!(sel.begin_subscribe("s1", true).unwrap());
        assert_eq!(sel.state(), ConnectionState::Subscribing);
        assert!(sel.is_subscribed());

        assert!(sel.confirm("s1"));
        assert_eq!(sel.state(), ConnectionState::PushActive);

        assert_eq!(sel.teardown().as_deref(), Some("s1"));
        assert_eq!(sel.state(), ConnectionState::Polling);
        assert!(!sel.is_subscribed());
    }

    #[test]
    fn subscribe_requires_connection_and_session() {
        let mut sel = TransportSelector::new();
        assert!(matches!(sel.begin_subscribe("s1", false), Err(MirrorError::NotConnected)));
        assert!(matches!(sel.begin_subscribe("", true), Err(MirrorError::NoSession)));
        assert_eq!(sel.state(), ConnectionState::Polling);
    }

    #[test]
    fn repeated_subscribe_is_noop() {
        let mut sel = TransportSelector::new();
        assert!(sel.begin_subscribe("s1", true).unwrap());
        assert!(!sel.begin_subscribe("s1", true).unwrap());
        sel.confirm("s1");
        assert!(!sel.begin_subscribe("s1", true).unwrap());
        assert_eq!(sel.state(), ConnectionState::PushActive);
    }

    #[test]
    fn confirm_fires_once() {
        let mut sel = TransportSelector::new();
        // A push frame can beat the subscribe bookkeeping.
        assert!(sel.confirm("s1"));
        assert!(!sel.confirm("s1"));
        assert!(sel.is_subscribed());
    }

    #[test]
    fn subscribe_failure_reverts() {
        let mut sel = TransportSelector::new();
        sel.begin_subscribe("s1", true).unwrap();
        sel.subscribe_failed().unwrap();
        assert_eq!(sel.state(), ConnectionState::Polling);
        assert!(sel.subscribe_failed().is_err());
    }

    #[test]
    fn channel_lost_reports_previous_state() {
        let mut sel = TransportSelector::new();
        sel.begin_subscribe("s1", true).unwrap();
        sel.confirm("s1");
        assert_eq!(sel.channel_lost(), ConnectionState::PushActive);
        assert_eq!(sel.state(), ConnectionState::Polling);
        assert_eq!(sel.teardown(), None);
    }

    #[test]
    fn teardown_without_subscription() {
        let mut sel = TransportSelector::new();
        assert_eq!(sel.teardown(), None);
    }

    #[test]
    fn polls_only_before_push() {
        assert!(ConnectionState::Polling.polls());
        assert!(ConnectionState::Subscribing.polls());
        assert!(!ConnectionState::PushActive.polls());
        assert_eq!(ConnectionState::PushActive.to_string(), "PushActive");
    }
}
