//! Scenario and suite results.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One recorded comparison or lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// What was checked.
    pub name: String,
    /// Whether it passed.
    pub passed: bool,
    /// Observed value or failure reason.
    pub detail: Option<String>,
}

impl Check {
    /// A passing check.
    #[must_use]
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: None,
        }
    }

    /// A failing check with a reason.
    #[must_use]
    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "ok" } else { "FAILED" };
        match &self.detail {
            Some(detail) => write!(f, "[{mark}] {}: {detail}", self.name),
            None => write!(f, "[{mark}] {}", self.name),
        }
    }
}

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Scenario name.
    pub name: String,
    /// True when every check passed and nothing aborted the scenario.
    pub passed: bool,
    /// Every check, in the order recorded.
    pub checks: Vec<Check>,
    /// Error that aborted the scenario, if any.
    pub error: Option<String>,
    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
}

impl ScenarioOutcome {
    /// Builds an outcome, deriving `passed` from the checks and error.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        checks: Vec<Check>,
        error: Option<String>,
        elapsed: Duration,
    ) -> Self {
        let passed = error.is_none() && checks.iter().all(|c| c.passed);
        Self {
            name: name.into(),
            passed,
            checks,
            error,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Checks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Result of a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Per-scenario outcomes, in run order.
    pub scenarios: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// Appends a scenario outcome.
    pub fn push(&mut self, outcome: ScenarioOutcome) {
        self.scenarios.push(outcome);
    }

    /// Number of scenarios that passed.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed).count()
    }

    /// Number of scenarios that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    /// True when at least one scenario ran and none failed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.passed() > 0 && self.failed() == 0
    }

    /// The one-line tally printed at the end of a run.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} tests passed, {} tests failed.", self.passed(), self.failed())
    }

    /// Writes the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the report cannot be serialized or written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, passed: bool) -> ScenarioOutcome {
        let check = if passed {
            Check::pass("delivery")
        } else {
            Check::fail("delivery", "{count: 9999, out_of_order: 0}")
        };
        ScenarioOutcome::new(name, vec![check], None, Duration::from_millis(1500))
    }

    #[test]
    fn test_outcome_derives_passed() {
        assert!(outcome("basic", true).passed);
        assert!(!outcome("basic", false).passed);

        let aborted = ScenarioOutcome::new(
            "simple",
            vec![Check::pass("start")],
            Some("setup failed".into()),
            Duration::ZERO,
        );
        assert!(!aborted.passed);
    }

    #[test]
    fn test_no_checks_passes() {
        let outcome = ScenarioOutcome::new("latency", Vec::new(), None, Duration::ZERO);
        assert!(outcome.passed);
    }

    #[test]
    fn test_summary() {
        let mut report = SuiteReport::default();
        report.push(outcome("simple", true));
        report.push(outcome("basic", false));
        report.push(outcome("param", true));
        assert_eq!(report.summary(), "2 tests passed, 1 tests failed.");
        assert!(!report.success());
    }

    #[test]
    fn test_empty_suite_is_not_success() {
        assert!(!SuiteReport::default().success());
    }

    #[test]
    fn test_check_display() {
        assert_eq!(Check::pass("start simpletest").to_string(), "[ok] start simpletest");
        assert_eq!(
            Check::fail("stop 1463", "inconclusive: no pid").to_string(),
            "[FAILED] stop 1463: inconclusive: no pid"
        );
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.json");
        let mut report = SuiteReport::default();
        report.push(outcome("basic", false));
        report.write_json(&path).expect("write");

        let back: SuiteReport =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(back, report);
        assert_eq!(back.scenarios[0].elapsed_ms, 1500);
    }
}
