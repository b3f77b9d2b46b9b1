//! Generator error types.

use quill_transport::TransportError;

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Generator errors.
///
/// Per-batch transport failures are not errors: they are logged and counted
/// in the [`SendReport`](crate::SendReport). Only failures that prevent a run
/// from starting surface here.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Parameters cannot describe a run.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// A session could not be opened.
    #[error("could not open session {index}: {source}")]
    Session {
        /// Zero-based session index.
        index: usize,
        /// Underlying transport error.
        source: TransportError,
    },

    /// A fan-out child could not be launched.
    #[error("could not spawn sender for category {category}: {source}")]
    Spawn {
        /// Category the child would have sent.
        category: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A fan-out task panicked or was cancelled.
    #[error("sender task failed: {0}")]
    Join(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error outside a batch send.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl LoadError {
    /// Creates an invalid-parameters error.
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }
}
