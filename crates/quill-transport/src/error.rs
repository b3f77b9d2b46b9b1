//! Error types for the RPC boundary.

use std::time::Duration;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport failures.
///
/// None of these abort a generator run on their own: the generator logs
/// them and delivery is judged later from the SUT's output files. Only a
/// failure to open a session is fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Could not open a session.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// `host:port` that was dialled.
        endpoint: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// I/O error on an open session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent bytes that do not decode as a `Log` reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer answered with a `TApplicationException`.
    #[error("application exception ({kind}): {message}")]
    Application {
        /// Exception type code.
        kind: i32,
        /// Exception message.
        message: String,
    },

    /// A send or receive did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being attempted.
        operation: &'static str,
        /// The configured limit.
        after: Duration,
    },

    /// A reply frame exceeded the configured cap.
    #[error("frame too large: {length} bytes (cap {max})")]
    FrameTooLarge {
        /// Advertised frame length.
        length: usize,
        /// Configured cap.
        max: usize,
    },

    /// The session was already closed.
    #[error("session closed")]
    Closed,
}

impl TransportError {
    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates a connect error.
    #[must_use]
    pub fn connect(endpoint: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub const fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Returns true if the session can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io(_) | Self::Closed | Self::FrameTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_display() {
        let err = TransportError::Application {
            kind: 1,
            message: "Invalid method name: 'Lg'".into(),
        };
        assert_eq!(
            err.to_string(),
            "application exception (1): Invalid method name: 'Lg'"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_connect_is_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::connect("localhost:1463", io);
        assert!(err.to_string().contains("localhost:1463"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_timeout_display() {
        let err = TransportError::timeout("send", Duration::from_secs(1));
        assert_eq!(err.to_string(), "send timed out after 1s");
    }
}
