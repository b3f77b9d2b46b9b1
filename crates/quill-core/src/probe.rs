//! Literal content probes for scenarios that check individual messages
//! rather than synthetic sequences.

use std::path::Path;

use crate::error::{CoreError, Result};

/// Returns true if `path` contains `needle` anywhere.
pub fn file_contains(path: &Path, needle: &[u8]) -> Result<bool> {
    let data = std::fs::read(path).map_err(|e| CoreError::file(path, e))?;
    if needle.is_empty() {
        return Ok(true);
    }
    Ok(data.windows(needle.len()).any(|w| w == needle))
}

/// Returns true if `path` begins with the concatenation of `parts`.
pub fn file_starts_with(path: &Path, parts: &[&[u8]]) -> Result<bool> {
    let data = std::fs::read(path).map_err(|e| CoreError::file(path, e))?;
    let mut rest = data.as_slice();
    for part in parts {
        match rest.strip_prefix(*part) {
            Some(tail) => rest = tail,
            None => return Ok(false),
        }
    }
    Ok(true)
}
