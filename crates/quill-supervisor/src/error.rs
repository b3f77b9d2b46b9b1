//! Supervisor error types.

use std::path::PathBuf;

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Process supervision errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// A managed process could not be launched.
    #[error("could not launch {}: {source}", program.display())]
    Launch {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The control utility could not be run at all.
    #[error("control utility {} unavailable: {source}", program.display())]
    ControlUnavailable {
        /// Control utility path.
        program: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Signal delivery failed for a reason other than the process being gone.
    #[error("failed to signal pid {pid}: {reason}")]
    Signal {
        /// Target process id.
        pid: u32,
        /// Error reported by the OS.
        reason: String,
    },

    /// A managed process has no usable id.
    #[error("process not found: {0}")]
    NotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Creates a launch error.
    #[must_use]
    pub fn launch(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Launch {
            program: program.into(),
            source,
        }
    }

    /// Creates a control-unavailable error.
    #[must_use]
    pub fn control(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ControlUnavailable {
            program: program.into(),
            source,
        }
    }

    /// Creates a signal error.
    #[must_use]
    pub fn signal(pid: u32, reason: impl Into<String>) -> Self {
        Self::Signal {
            pid,
            reason: reason.into(),
        }
    }
}
