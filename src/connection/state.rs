//! Connection lifecycle states.
//!
//! Transitions only move forward: `Connecting -> Open -> Closing -> Closed`,
//! with `Closed` reachable from every other state and terminal.

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Handshake in progress, no application frames accepted.
    #[default]
    Connecting,
    /// Bidirectional frame exchange.
    Open,
    /// Close handshake in progress; only a Close is processed inbound.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for every state except `Closed`.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Returns `true` only for `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Connecting, ConnectionState::Open)
                | (ConnectionState::Connecting, ConnectionState::Closed)
                | (ConnectionState::Open, ConnectionState::Closing)
                | (ConnectionState::Open, ConnectionState::Closed)
                | (ConnectionState::Closing, ConnectionState::Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Which side sent the first Close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CloseInitiator {
    /// No Close frame exchanged yet.
    #[default]
    None,
    /// This server closed first.
    Local,
    /// The peer closed first.
    Remote,
}

impl std::fmt::Display for CloseInitiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseInitiator::None => write!(f, "None"),
            CloseInitiator::Local => write!(f, "Local"),
            CloseInitiator::Remote => write!(f, "Remote"),
        }
    }
}
