//! Per-category fan-out of [`stress_test`].
//!
//! Every category gets its own sender with nothing shared between them.
//! The parent only joins on completion.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use quill_transport::Connector;
use tokio::process::{Child, Command};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::error::{LoadError, Result};
use crate::report::SendReport;
use crate::stress::{StressParams, stress_test};

/// How each category's sender is isolated.
#[derive(Clone)]
pub enum FanOut {
    /// One OS process per category.
    Processes(ProcessFanOut),
    /// One Tokio task per category, each with its own session.
    Tasks {
        /// Opens each task's session.
        connector: Arc<dyn Connector>,
    },
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processes(p) => f.debug_tuple("Processes").field(p).finish(),
            Self::Tasks { connector } => f
                .debug_struct("Tasks")
                .field("connector", &connector.describe())
                .finish(),
        }
    }
}

/// Command that runs one category's stress test in a child process.
///
/// The child is invoked as `<program> <leading_args>... stress --category ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFanOut {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl ProcessFanOut {
    /// Creates a fan-out that runs `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Re-executes the running binary.
    ///
    /// # Errors
    /// Returns an error if the current executable cannot be located.
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Arguments placed before the `stress` subcommand, such as global
    /// flags.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    fn spawn(&self, params: &StressParams) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.leading_args)
            .args(stress_args(params))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Command-line arguments for the hidden `stress` subcommand.
#[must_use]
pub fn stress_args(params: &StressParams) -> Vec<String> {
    let mut args = vec![
        "stress".to_string(),
        "--category".to_string(),
        params.category.clone(),
        "--client".to_string(),
        params.client_id.clone(),
        "--rate".to_string(),
        params.rate.to_string(),
        "--total".to_string(),
        params.total.to_string(),
        "--batch-size".to_string(),
        params.batch_size.to_string(),
        "--avg-size".to_string(),
        params.avg_size.to_string(),
        "--fanout".to_string(),
        params.category_fanout.to_string(),
        "--first-sequence".to_string(),
        params.first_sequence.to_string(),
    ];
    if let Some(seed) = params.seed {
        args.push("--seed".to_string());
        args.push(seed.to_string());
    }
    args
}

/// How one category's sender finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// In-process sender completed.
    Sent(SendReport),
    /// Child process exited with this code; `None` if killed by a signal.
    Exited(Option<i32>),
    /// Sender could not start its run.
    Failed(String),
}

impl RunOutcome {
    /// Returns true if the sender ran to completion.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Sent(_) | Self::Exited(Some(0)))
    }
}

/// One category's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutRun {
    /// Category this sender targeted.
    pub category: String,
    /// How it finished.
    pub outcome: RunOutcome,
}

/// Result of a [`super_stress_test`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    /// Per-category results, in the order categories were given.
    pub runs: Vec<FanOutRun>,
    /// Wall time until the last sender finished.
    pub elapsed: Duration,
}

impl FanOutReport {
    /// Returns true if every sender ran to completion.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.runs.iter().all(|run| run.outcome.is_success())
    }
}

/// Runs `template` once per category, concurrently and in isolation, and
/// waits for every sender to finish.
///
/// # Errors
/// Returns an error if the template is invalid, a child process cannot be
/// spawned (already started children are killed first), or a sender task
/// panics.
pub async fn super_stress_test(
    fanout: &FanOut,
    categories: &[String],
    template: &StressParams,
) -> Result<FanOutReport> {
    template.validate()?;
    tracing::info!(
        categories = ?categories,
        client = %template.client_id,
        total = template.total,
        mode = ?fanout,
        "starting super stress test"
    );

    let start = Instant::now();
    let runs = match fanout {
        FanOut::Processes(command) => run_processes(command, categories, template).await?,
        FanOut::Tasks { connector } => run_tasks(connector, categories, template).await?,
    };

    let report = FanOutReport {
        runs,
        elapsed: start.elapsed(),
    };
    tracing::info!(
        succeeded = report.runs.iter().filter(|r| r.outcome.is_success()).count(),
        total = report.runs.len(),
        elapsed = ?report.elapsed,
        "super stress test completed"
    );
    Ok(report)
}

async fn run_processes(
    command: &ProcessFanOut,
    categories: &[String],
    template: &StressParams,
) -> Result<Vec<FanOutRun>> {
    let mut children: Vec<(String, Child)> = Vec::with_capacity(categories.len());
    for category in categories {
        match command.spawn(&template.for_category(category.as_str())) {
            Ok(child) => {
                tracing::debug!(category = %category, pid = ?child.id(), "spawned sender");
                children.push((category.clone(), child));
            }
            Err(source) => {
                tracing::error!(category = %category, error = %source, "could not spawn sender");
                for (started, mut child) in children {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(category = %started, error = %e, "could not kill sender");
                    }
                    if let Err(e) = child.wait().await {
                        tracing::warn!(category = %started, error = %e, "could not reap sender");
                    }
                }
                return Err(LoadError::Spawn {
                    category: category.clone(),
                    source,
                });
            }
        }
    }

    let mut runs = Vec::with_capacity(children.len());
    for (category, mut child) in children {
        let outcome = match child.wait().await {
            Ok(status) => {
                if !status.success() {
                    tracing::warn!(
                        category = %category,
                        status = %status,
                        "sender exited unsuccessfully"
                    );
                }
                RunOutcome::Exited(status.code())
            }
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "could not wait for sender");
                RunOutcome::Failed(e.to_string())
            }
        };
        runs.push(FanOutRun { category, outcome });
    }
    Ok(runs)
}

async fn run_tasks(
    connector: &Arc<dyn Connector>,
    categories: &[String],
    template: &StressParams,
) -> Result<Vec<FanOutRun>> {
    let mut set = JoinSet::new();
    for (slot, category) in categories.iter().enumerate() {
        let connector = Arc::clone(connector);
        let params = template.for_category(category.as_str());
        set.spawn(async move {
            let outcome = match stress_test(connector.as_ref(), &params).await {
                Ok(report) => RunOutcome::Sent(report),
                Err(e) => RunOutcome::Failed(e.to_string()),
            };
            (slot, outcome)
        });
    }

    let mut outcomes: Vec<Option<RunOutcome>> = vec![None; categories.len()];
    while let Some(joined) = set.join_next().await {
        let (slot, outcome) = joined.map_err(|e| LoadError::Join(e.to_string()))?;
        outcomes[slot] = Some(outcome);
    }

    Ok(categories
        .iter()
        .zip(outcomes)
        .map(|(category, outcome)| FanOutRun {
            category: category.clone(),
            outcome: outcome
                .unwrap_or_else(|| RunOutcome::Failed("sender never reported".to_string())),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_transport::MemoryConnector;

    #[test]
    fn test_stress_args() {
        let params = StressParams {
            seed: Some(9),
            ..StressParams::new("rock", "client1")
        };
        let args = stress_args(&params);
        assert_eq!(args[0], "stress");
        assert_eq!(&args[1..3], ["--category", "rock"]);
        assert_eq!(&args[3..5], ["--client", "client1"]);
        assert!(args.windows(2).any(|w| w == ["--total", "200000"]));
        assert_eq!(&args[args.len() - 2..], ["--seed", "9"]);
    }

    #[test]
    fn test_stress_args_without_seed() {
        let args = stress_args(&StressParams::default());
        assert!(!args.iter().any(|a| a == "--seed"));
    }

    #[test]
    fn test_outcome_success() {
        assert!(RunOutcome::Sent(SendReport::default()).is_success());
        assert!(RunOutcome::Exited(Some(0)).is_success());
        assert!(!RunOutcome::Exited(Some(1)).is_success());
        assert!(!RunOutcome::Exited(None).is_success());
        assert!(!RunOutcome::Failed("x".into()).is_success());
    }

    #[tokio::test]
    async fn test_tasks_keep_category_order() {
        let connector = MemoryConnector::new();
        let fanout = FanOut::Tasks {
            connector: Arc::new(connector.clone()),
        };
        let categories = vec!["rock".to_string(), "paper".to_string(), "scissors".to_string()];
        let template = StressParams {
            rate: 1_000_000,
            total: 40,
            ..StressParams::new("unused", "client1")
        };

        let report = super_stress_test(&fanout, &categories, &template)
            .await
            .expect("run");

        let names: Vec<_> = report.runs.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(names, ["rock", "paper", "scissors"]);
        assert!(report.all_succeeded());
        assert_eq!(connector.sessions(), 3);
        assert_eq!(connector.entries().len(), 120);
    }

    #[tokio::test]
    async fn test_task_open_failure_is_recorded() {
        let connector = MemoryConnector::new().with_open_limit(1);
        let fanout = FanOut::Tasks {
            connector: Arc::new(connector),
        };
        let categories = vec!["rock".to_string(), "paper".to_string()];
        let template = StressParams {
            rate: 1_000_000,
            total: 10,
            ..StressParams::default()
        };

        let report = super_stress_test(&fanout, &categories, &template)
            .await
            .expect("run");
        assert!(!report.all_succeeded());
        assert_eq!(
            report
                .runs
                .iter()
                .filter(|r| matches!(r.outcome, RunOutcome::Failed(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_template_rejected() {
        let fanout = FanOut::Tasks {
            connector: Arc::new(MemoryConnector::new()),
        };
        let template = StressParams {
            rate: 0,
            ..StressParams::default()
        };
        let err = super_stress_test(&fanout, &["rock".to_string()], &template)
            .await
            .expect_err("invalid");
        assert!(matches!(err, LoadError::InvalidParams(_)));
    }
}
