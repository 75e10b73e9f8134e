//! zkelect Error Types

use thiserror::Error;

/// Result type alias for zkelect operations
pub type Result<T> = std::result::Result<T, Error>;

/// zkelect error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Coordination-service errors
    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Node not found: {0}")]
    NoNode(String),

    #[error("Version mismatch on {0}")]
    BadVersion(String),

    #[error("Coordination connection closed")]
    ConnectionClosed,

    #[error("Coordination session expired")]
    SessionExpired,

    #[error("No coordination server available")]
    NoServer,

    #[error("Coordination protocol error: {0}")]
    Protocol(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Lifecycle errors
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error warrants a reconnection attempt.
    ///
    /// Only a dropped connection, an expired session or an unreachable
    /// ensemble can be healed by opening a new session; everything else
    /// terminates the automaton.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionClosed | Error::SessionExpired | Error::NoServer
        )
    }

    /// Check if this error is a cooperative-shutdown cause rather than a
    /// failure.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::ConnectionClosed.is_recoverable());
        assert!(Error::SessionExpired.is_recoverable());
        assert!(Error::NoServer.is_recoverable());

        assert!(!Error::NodeExists("/election".into()).is_recoverable());
        assert!(!Error::NoNode("/data".into()).is_recoverable());
        assert!(!Error::Protocol("short frame".into()).is_recoverable());
        assert!(!Error::Cancelled("shut down by signal".into()).is_recoverable());
    }

    #[test]
    fn test_shutdown_classification() {
        assert!(Error::Cancelled("shut down by signal".into()).is_shutdown());
        assert!(!Error::ConnectionClosed.is_shutdown());
    }
}
