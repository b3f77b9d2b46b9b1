//! The unit of traffic submitted to the system under test.

use std::fmt;

/// One log entry: a category and an opaque message body.
///
/// The SUT never interprets `message`; it may hold arbitrary bytes,
/// including NULs and newlines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogEntry {
    category: String,
    message: Vec<u8>,
}

impl LogEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(category: impl Into<String>, message: impl Into<Vec<u8>>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }

    /// Returns the category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the message body.
    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }
}

/// Result code returned by the SUT's `Log` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Entries were accepted.
    Ok,
    /// The server is overloaded or not ready; the client should resend later.
    TryLater,
    /// A code this harness does not know about.
    Unknown(i32),
}

impl ResultCode {
    /// Returns true for [`ResultCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::TryLater => 1,
            Self::Unknown(code) => code,
        }
    }
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::TryLater,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::TryLater => f.write_str("TRY_LATER"),
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_keeps_binary_message() {
        let entry = LogEntry::new("scribe_test", b"and a binary\x00\x01 message\n".to_vec());
        assert_eq!(entry.category(), "scribe_test");
        assert_eq!(entry.message()[12], 0);
        assert_eq!(entry.message()[13], 1);
    }

    #[test]
    fn test_result_code_wire_values() {
        assert_eq!(ResultCode::from(0), ResultCode::Ok);
        assert_eq!(ResultCode::from(1), ResultCode::TryLater);
        assert_eq!(ResultCode::from(7), ResultCode::Unknown(7));
        assert_eq!(ResultCode::TryLater.as_i32(), 1);
        assert_eq!(ResultCode::Unknown(-3).as_i32(), -3);
    }

    #[test]
    fn test_result_code_display() {
        assert!(ResultCode::Ok.is_ok());
        assert!(!ResultCode::TryLater.is_ok());
        assert_eq!(ResultCode::TryLater.to_string(), "TRY_LATER");
        assert_eq!(ResultCode::Unknown(9).to_string(), "UNKNOWN(9)");
    }
}
