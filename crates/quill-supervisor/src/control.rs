//! Wrapper around the `scribe_ctrl` utility.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;

use crate::error::{Result, SupervisorError};

/// Runs `scribe_ctrl <subcommand> <port>`.
#[derive(Debug, Clone)]
pub struct ControlUtility {
    program: PathBuf,
}

impl ControlUtility {
    /// Creates a wrapper for the utility at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the utility path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, subcommand: &str, port: u16) -> Result<Output> {
        let output = Command::new(&self.program)
            .arg(subcommand)
            .arg(port.to_string())
            .output()
            .await
            .map_err(|e| SupervisorError::control(&self.program, e))?;

        tracing::debug!(
            subcommand,
            port,
            code = ?output.status.code(),
            stdout = %String::from_utf8_lossy(&output.stdout).trim_end(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
            "scribe_ctrl finished"
        );
        Ok(output)
    }

    /// Asks the server on `port` to shut down. Returns the exit code.
    ///
    /// # Errors
    /// Returns an error if the utility cannot be run.
    pub async fn stop(&self, port: u16) -> Result<Option<i32>> {
        Ok(self.run("stop", port).await?.status.code())
    }

    /// Queries fb303 status. Returns the exit code, which encodes the status.
    ///
    /// # Errors
    /// Returns an error if the utility cannot be run.
    pub async fn status(&self, port: u16) -> Result<Option<i32>> {
        Ok(self.run("status", port).await?.status.code())
    }

    /// Fetches the server's counters.
    ///
    /// # Errors
    /// Returns an error if the utility cannot be run.
    pub async fn counters(&self, port: u16) -> Result<BTreeMap<String, i64>> {
        let output = self.run("counters", port).await?;
        Ok(parse_counters(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses `name: value` lines. Lines that do not fit are skipped.
///
/// Counter names may themselves contain `:` (`scribe_overall:received good`),
/// so only the first `": "` separates name from value.
#[must_use]
pub fn parse_counters(text: &str) -> BTreeMap<String, i64> {
    text.lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(": ")?;
            let value = value.trim().parse().ok()?;
            Some((name.trim().to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counters() {
        let text = "scribe_overall:received good: 10000\n\
                    scribe_overall:sent: 9990\n\
                    garbage line\n\
                    test:denied for queue size: 0\n\
                    bad value: ten\n";
        let counters = parse_counters(text);
        assert_eq!(counters.len(), 3);
        assert_eq!(counters["scribe_overall:received good"], 10000);
        assert_eq!(counters["scribe_overall:sent"], 9990);
        assert_eq!(counters["test:denied for queue size"], 0);
    }

    #[test]
    fn test_parse_counters_empty() {
        assert!(parse_counters("").is_empty());
    }

    #[tokio::test]
    async fn test_missing_utility() {
        let ctrl = ControlUtility::new("/nonexistent/scribe_ctrl");
        let err = ctrl.status(1463).await.expect_err("must fail");
        assert!(matches!(err, SupervisorError::ControlUnavailable { .. }));
    }
}
