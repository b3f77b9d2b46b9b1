//! Per-scenario state: supervised servers, traffic, and recorded checks.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quill_core::{
    CoreError, Delivery, GracePeriods, HarnessConfig, LogEntry, file_contains, file_starts_with,
    result_checker,
};
use quill_load::{FanOut, FanOutReport, SendReport, StressParams, stress_test, super_stress_test};
use quill_supervisor::{ManagedProcess, ProcessSupervisor, ScribeInstance, StopOutcome};
use quill_transport::{Connector, MemoryConnector, ScribeConnector, log_or_warn};
use tokio::time::Instant;

use crate::error::{Result, SuiteError};
use crate::report::{Check, ScenarioOutcome};

/// Everything scenarios share: configuration, where traffic goes, and how
/// fan-out senders are isolated.
#[derive(Clone)]
pub struct Environment {
    config: HarnessConfig,
    connector: Arc<dyn Connector>,
    fanout: FanOut,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("target", &self.connector.describe())
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Sends to the configured SUT over TCP, fanning out with tasks.
    #[must_use]
    pub fn tcp(config: HarnessConfig) -> Self {
        let connector: Arc<dyn Connector> = Arc::new(ScribeConnector::new(
            config.sut.host.clone(),
            config.sut.port,
            config.rpc.clone(),
        ));
        Self::with_connector(config, connector)
    }

    /// Records traffic in memory instead of sending it.
    #[must_use]
    pub fn dry_run(config: HarnessConfig) -> Self {
        Self::with_connector(config, Arc::new(MemoryConnector::new()))
    }

    /// Uses an explicit connector, fanning out with tasks over it.
    #[must_use]
    pub fn with_connector(config: HarnessConfig, connector: Arc<dyn Connector>) -> Self {
        let fanout = FanOut::Tasks {
            connector: Arc::clone(&connector),
        };
        Self {
            config,
            connector,
            fanout,
        }
    }

    /// Replaces the fan-out mode.
    #[must_use]
    pub fn with_fanout(mut self, fanout: FanOut) -> Self {
        self.fanout = fanout;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Returns the connector traffic is sent through.
    #[must_use]
    pub fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }

    /// Returns the fan-out mode.
    #[must_use]
    pub const fn fanout(&self) -> &FanOut {
        &self.fanout
    }
}

/// State for one scenario run.
///
/// Servers started through the context are tracked and stopped by
/// [`teardown`](Self::teardown) if the scenario does not stop them itself.
/// Every start, stop and comparison is recorded as a [`Check`].
pub struct ScenarioContext {
    name: String,
    env: Environment,
    supervisor: ProcessSupervisor,
    instances: Vec<ScribeInstance>,
    helpers: Vec<ManagedProcess>,
    checks: Vec<Check>,
    started: Instant,
}

impl ScenarioContext {
    /// Creates a context for scenario `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, env: &Environment) -> Self {
        let config = env.config();
        Self {
            name: name.into(),
            supervisor: ProcessSupervisor::new(config.sut.clone(), config.grace.clone()),
            env: env.clone(),
            instances: Vec::new(),
            helpers: Vec::new(),
            checks: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Returns the scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the harness configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        self.env.config()
    }

    /// Returns the grace periods.
    #[must_use]
    pub const fn grace(&self) -> &GracePeriods {
        &self.env.config().grace
    }

    /// Returns the process supervisor.
    #[must_use]
    pub const fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Resolves `rel` under the primary scratch root.
    #[must_use]
    pub fn primary(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.config().primary_root().join(rel)
    }

    /// Resolves `rel` under the secondary scratch root.
    #[must_use]
    pub fn secondary(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.config().secondary_root().join(rel)
    }

    /// Records a check.
    pub fn check(&mut self, check: Check) -> bool {
        if check.passed {
            tracing::info!(scenario = %self.name, check = %check.name, "check passed");
        } else {
            tracing::error!(
                scenario = %self.name,
                check = %check.name,
                detail = check.detail.as_deref().unwrap_or(""),
                "check failed"
            );
        }
        let passed = check.passed;
        self.checks.push(check);
        passed
    }

    /// Returns the checks recorded so far.
    #[must_use]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// True if every check so far passed.
    #[must_use]
    pub fn passing(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Starts `scribed` on `port` with config file `conf` from the config
    /// directory.
    ///
    /// # Errors
    /// Returns an error if the server cannot be launched.
    pub async fn start(&mut self, test_name: &str, port: u16, conf: &str) -> Result<()> {
        let conf_path = self.config().sut.conf(conf);
        let label = format!("start {test_name} on port {port}");
        match self.supervisor.start(test_name, port, &conf_path).await {
            Ok(instance) => {
                self.check(Check::pass(label));
                self.instances.push(instance);
                Ok(())
            }
            Err(e) => {
                self.check(Check::fail(label, e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Stops the server on `port` and records whether it stopped cleanly.
    pub async fn stop(&mut self, port: u16) -> bool {
        let outcome = match self.instances.iter().position(|i| i.port() == port) {
            Some(index) => {
                let instance = self.instances.remove(index);
                self.supervisor.stop_instance(instance).await
            }
            None => self.supervisor.stop(port, None).await,
        };
        self.record_stop(port, &outcome)
    }

    /// Records whether the server on `port` still reports itself alive.
    pub async fn expect_alive(&mut self, port: u16) -> bool {
        let label = format!("scribed on port {port} alive");
        if self.supervisor.status(port).await {
            self.check(Check::pass(label))
        } else {
            self.check(Check::fail(label, "status query did not report alive"))
        }
    }

    fn record_stop(&mut self, port: u16, outcome: &StopOutcome) -> bool {
        let label = format!("stop scribed on port {port}");
        if outcome.is_success() {
            self.check(Check::pass(label))
        } else {
            self.check(Check::fail(label, outcome.to_string()))
        }
    }

    /// Launches a helper process that teardown will kill.
    ///
    /// # Errors
    /// Returns an error if the helper cannot be launched.
    pub fn spawn_helper<I, S>(&mut self, name: &str, program: &Path, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let label = format!("start helper {name}");
        match self.supervisor.spawn_helper(name, program, args) {
            Ok(helper) => {
                tracing::info!(
                    scenario = %self.name,
                    helper = name,
                    pid = helper.pid(),
                    "started helper"
                );
                self.check(Check::pass(label));
                self.helpers.push(helper);
                Ok(())
            }
            Err(e) => {
                self.check(Check::fail(label, e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Runs a single-session stress test against the primary port.
    ///
    /// # Errors
    /// Returns an error if the run cannot start.
    pub async fn stress(&self, params: &StressParams) -> Result<SendReport> {
        tracing::info!(
            scenario = %self.name,
            category = %params.category,
            client = %params.client_id,
            total = params.total,
            "sending"
        );
        Ok(stress_test(self.env.connector(), params).await?)
    }

    /// Runs one isolated sender per category and records whether every
    /// sender finished.
    ///
    /// # Errors
    /// Returns an error if the senders cannot be launched.
    pub async fn super_stress(
        &mut self,
        categories: &[String],
        template: &StressParams,
    ) -> Result<FanOutReport> {
        let report = super_stress_test(self.env.fanout(), categories, template).await?;
        let label = format!("{} fan-out senders finished", categories.len());
        if report.all_succeeded() {
            self.check(Check::pass(label));
        } else {
            let failed: Vec<&str> = report
                .runs
                .iter()
                .filter(|r| !r.outcome.is_success())
                .map(|r| r.category.as_str())
                .collect();
            self.check(Check::fail(label, format!("failed categories: {failed:?}")));
        }
        Ok(report)
    }

    /// Sends one batch over a fresh session.
    ///
    /// Returns true if the server answered `OK`. Failures are logged, never
    /// raised: delivery is judged from the output files.
    pub async fn send(&self, entries: &[LogEntry]) -> bool {
        let connector = self.env.connector();
        let mut sink = match connector.connect().await {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!(
                    target_endpoint = %connector.describe(),
                    error = %e,
                    "could not open session"
                );
                return false;
            }
        };
        let ok = log_or_warn(sink.as_mut(), entries).await;
        if let Err(e) = sink.close().await {
            tracing::warn!(error = %e, "error closing session");
        }
        ok
    }

    /// Sleeps a grace period.
    pub async fn settle(&self, reason: &str, period: Duration) {
        tracing::info!(scenario = %self.name, reason, period = ?period, "waiting");
        tokio::time::sleep(period).await;
    }

    /// Verifies `client` delivered exactly `expected` into `dir/<prefix>*`.
    ///
    /// # Errors
    /// Returns an error if the output cannot be read.
    pub fn expect_delivery(
        &mut self,
        dir: &Path,
        prefix: &str,
        client: &str,
        expected: Delivery,
    ) -> Result<bool> {
        let label = format!("{client} in {}/{prefix}*", dir.display());
        let observed = self.verify(&label, dir, prefix, client)?;
        Ok(if observed == expected {
            self.check(Check {
                name: label,
                passed: true,
                detail: Some(observed.to_string()),
            })
        } else {
            self.check(Check::fail(label, format!("expected {expected}, observed {observed}")))
        })
    }

    /// Verifies at least `min` lines from `client` reached `dir/<prefix>*`.
    ///
    /// # Errors
    /// Returns an error if the output cannot be read.
    pub fn expect_at_least(
        &mut self,
        dir: &Path,
        prefix: &str,
        client: &str,
        min: u64,
    ) -> Result<bool> {
        let label = format!("{client} in {}/{prefix}* at least {min}", dir.display());
        let observed = self.verify(&label, dir, prefix, client)?;
        Ok(if observed.count >= min {
            self.check(Check {
                name: label,
                passed: true,
                detail: Some(observed.to_string()),
            })
        } else {
            self.check(Check::fail(label, format!("observed {observed}")))
        })
    }

    /// Verifies no lines from `client` remain in `dir/<prefix>*`. A missing
    /// directory counts as drained.
    pub fn expect_drained(&mut self, dir: &Path, prefix: &str, client: &str) -> bool {
        let label = format!("{client} drained from {}/{prefix}*", dir.display());
        match result_checker(dir, prefix, client) {
            Ok(report) if report.delivery() == Delivery::default() => {
                self.check(Check::pass(label))
            }
            Ok(report) => self.check(Check::fail(label, format!("observed {}", report.delivery()))),
            Err(CoreError::DirectoryUnreadable { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                self.check(Check::pass(label))
            }
            Err(e) => self.check(Check::fail(label, e.to_string())),
        }
    }

    /// Verifies `path` contains `needle`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn expect_contains(&mut self, path: &Path, needle: &[u8]) -> Result<bool> {
        let label = format!(
            "{} contains {:?}",
            path.display(),
            String::from_utf8_lossy(needle)
        );
        let found = self.probe(&label, file_contains(path, needle))?;
        Ok(if found {
            self.check(Check::pass(label))
        } else {
            self.check(Check::fail(label, "not found"))
        })
    }

    /// Verifies `path` begins with `parts`, in order.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn expect_starts_with(&mut self, path: &Path, parts: &[&[u8]]) -> Result<bool> {
        let label = format!("{} starts with {} expected lines", path.display(), parts.len());
        let found = self.probe(&label, file_starts_with(path, parts))?;
        Ok(if found {
            self.check(Check::pass(label))
        } else {
            self.check(Check::fail(label, "unexpected leading content"))
        })
    }

    fn verify(&mut self, label: &str, dir: &Path, prefix: &str, client: &str) -> Result<Delivery> {
        let report = self.probe(label, result_checker(dir, prefix, client))?;
        for tally in &report.files {
            tracing::debug!(
                file = %tally.path.display(),
                count = tally.delivery.count,
                out_of_order = tally.delivery.out_of_order,
                "file tally"
            );
        }
        Ok(report.delivery())
    }

    fn probe<T>(&mut self, label: &str, result: quill_core::Result<T>) -> Result<T> {
        result.map_err(|e| {
            self.check(Check::fail(label, e.to_string()));
            SuiteError::from(e)
        })
    }

    /// Kills helpers, then stops every server still tracked.
    pub async fn teardown(&mut self) {
        for mut helper in std::mem::take(&mut self.helpers) {
            match self.supervisor.kill_helper(&mut helper).await {
                Ok(_) => {
                    tracing::info!(helper = helper.name(), pid = helper.pid(), "stopped helper");
                }
                Err(e) => {
                    tracing::warn!(helper = helper.name(), error = %e, "could not stop helper");
                }
            }
        }
        while let Some(instance) = self.instances.pop() {
            let port = instance.port();
            let outcome = self.supervisor.stop_instance(instance).await;
            self.record_stop(port, &outcome);
        }
    }

    /// Closes the scenario into an outcome.
    #[must_use]
    pub fn finish(self, error: Option<SuiteError>) -> ScenarioOutcome {
        ScenarioOutcome::new(
            self.name,
            self.checks,
            error.map(|e| e.to_string()),
            self.started.elapsed(),
        )
    }
}
