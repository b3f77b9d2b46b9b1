//! Suite error types.

use quill_core::CoreError;
use quill_load::LoadError;
use quill_supervisor::SupervisorError;
use quill_transport::TransportError;

/// Result type alias for suite operations.
pub type Result<T> = std::result::Result<T, SuiteError>;

/// Errors that abort a scenario or the whole run.
///
/// Delivery mismatches are never errors; they are failed
/// [`Check`](crate::Check)s.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    /// No scenario with this name is registered.
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// A scenario could not set up its environment.
    #[error("setup failed: {0}")]
    Setup(String),

    /// Configuration or SUT output error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// RPC error outside a batch send.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Process lifecycle error.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Traffic generator error.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Report serialization error.
    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SuiteError {
    /// Creates a setup error.
    #[must_use]
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            SuiteError::UnknownScenario("nosuch".into()).to_string(),
            "unknown scenario: nosuch"
        );
        assert_eq!(
            SuiteError::setup("mount failed").to_string(),
            "setup failed: mount failed"
        );
    }

    #[test]
    fn test_wraps_load_error_transparently() {
        let err: SuiteError = LoadError::invalid("rate must be positive").into();
        assert_eq!(err.to_string(), "invalid parameters: rate must be positive");
    }
}
