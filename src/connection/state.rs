//! Connection state.

/// Lifecycle state of a connection.
///
/// A connection starts `Open` once the upgrade has completed and becomes
/// `Closed` after a Close frame is sent or received, or a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Frames may be exchanged.
    #[default]
    Open,
    /// The close handshake has started or the connection failed.
    Closed,
}

impl ConnectionState {
    /// Returns `true` while frames may be exchanged.
    #[must_use]
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Returns `true` once the connection is closed.
    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => f.write_str("open"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Open);
    }

    #[test]
    fn test_predicates() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Open.is_closed());
        assert!(ConnectionState::Closed.is_closed());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }
}
