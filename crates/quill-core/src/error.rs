//! Error types for quill-core.

use std::path::PathBuf;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while configuring the harness or reading SUT output.
///
/// Both unreadable-path variants are setup failures: the caller cannot
/// make a delivery judgement and should abort the current scenario.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An output directory could not be listed.
    #[error("could not open directory {}: {source}", path.display())]
    DirectoryUnreadable {
        /// The directory that was scanned.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An output file could not be opened or read.
    #[error("could not read result file {}: {source}", path.display())]
    FileUnreadable {
        /// The file that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a directory error for `path`.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Creates a file error for `path`.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error means SUT output could not be read.
    #[must_use]
    pub const fn is_unreadable_output(&self) -> bool {
        matches!(
            self,
            Self::DirectoryUnreadable { .. } | Self::FileUnreadable { .. }
        )
    }
}
