//! Scribe server lifecycle.
//!
//! # Stop sequence
//! 1. Run `scribe_ctrl stop <port>`
//! 2. If it succeeded, wait the stop grace period
//! 3. If a managed process is known, reap it or kill it
//! 4. Map the result to a [`StopOutcome`]
//!
//! Killing a process that was still alive is a failed stop: the server did
//! not honour the graceful stop in time. A stop command that could not run
//! is never read as success on its own.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

use quill_core::{GracePeriods, SutConfig};

use crate::control::ControlUtility;
use crate::error::{Result, SupervisorError};
use crate::process::ManagedProcess;

/// Result of stopping a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The server is confirmed gone.
    Stopped,
    /// The server was still alive after the grace period and was killed.
    ForcedKill {
        /// Process id that was killed.
        pid: u32,
    },
    /// Termination could not be confirmed either way.
    Inconclusive {
        /// What went wrong.
        reason: String,
    },
}

impl StopOutcome {
    /// Returns true only for [`StopOutcome::Stopped`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::ForcedKill { pid } => write!(f, "did not stop in time, killed pid {pid}"),
            Self::Inconclusive { reason } => write!(f, "inconclusive: {reason}"),
        }
    }
}

/// A running Scribe server.
#[derive(Debug)]
pub struct ScribeInstance {
    port: u16,
    process: ManagedProcess,
}

impl ScribeInstance {
    /// Returns the listen port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the server's process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// Returns the file receiving the server's output.
    #[must_use]
    pub fn output(&self) -> &Path {
        self.process.output()
    }
}

/// Starts, stops and queries Scribe servers and their helpers.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    sut: SutConfig,
    grace: GracePeriods,
    ctrl: ControlUtility,
}

impl ProcessSupervisor {
    /// Creates a supervisor for the binaries described by `sut`.
    #[must_use]
    pub fn new(sut: SutConfig, grace: GracePeriods) -> Self {
        let ctrl = ControlUtility::new(sut.scribe_ctrl());
        Self { sut, grace, ctrl }
    }

    /// Returns the SUT configuration.
    #[must_use]
    pub const fn sut(&self) -> &SutConfig {
        &self.sut
    }

    /// Returns the grace periods in use.
    #[must_use]
    pub const fn grace(&self) -> &GracePeriods {
        &self.grace
    }

    /// Launches `scribed -p <port> <config>`.
    ///
    /// Output goes to `scribed.out.<test_name>` under the log directory.
    /// Sleeps the startup grace period before returning so the server has
    /// bound its port.
    ///
    /// # Errors
    /// Returns an error if the server cannot be launched.
    pub async fn start(&self, test_name: &str, port: u16, config: &Path) -> Result<ScribeInstance> {
        let program = self.sut.scribed();
        let output = self.sut.log_dir.join(format!("scribed.out.{test_name}"));
        let port_arg = port.to_string();
        let args: [&OsStr; 3] = ["-p".as_ref(), port_arg.as_ref(), config.as_os_str()];

        let process = ManagedProcess::spawn("scribed", &program, args, &output).inspect_err(|e| {
            tracing::error!(test = test_name, port, error = %e, "could not start scribed");
        })?;

        tracing::info!(
            test = test_name,
            port,
            pid = process.pid(),
            config = %config.display(),
            "started scribed"
        );
        tokio::time::sleep(self.grace.startup).await;

        Ok(ScribeInstance { port, process })
    }

    /// Stops the server on `port`, confirming termination via `instance`
    /// when the process is managed here.
    pub async fn stop(&self, port: u16, instance: Option<&mut ScribeInstance>) -> StopOutcome {
        let command_ok = match self.ctrl.stop(port).await {
            Ok(Some(0)) => true,
            Ok(code) => {
                tracing::warn!(port, code = ?code, "scribe_ctrl stop failed");
                false
            }
            Err(e) => {
                tracing::warn!(port, error = %e, "could not run scribe_ctrl stop");
                false
            }
        };

        if command_ok {
            tokio::time::sleep(self.grace.stop).await;
        }

        let Some(instance) = instance else {
            return if command_ok {
                tracing::info!(port, "scribed stopped");
                StopOutcome::Stopped
            } else {
                StopOutcome::Inconclusive {
                    reason: format!("stop command failed for port {port} and no pid is known"),
                }
            };
        };

        let pid = instance.pid();
        match instance.process.kill().await {
            Ok(false) => {
                tracing::info!(port, pid, "scribed stopped");
                StopOutcome::Stopped
            }
            Ok(true) => {
                tracing::error!(
                    port,
                    pid,
                    grace = ?self.grace.stop,
                    "scribed did not stop in time"
                );
                StopOutcome::ForcedKill { pid }
            }
            Err(e) => {
                tracing::error!(port, pid, error = %e, "could not confirm scribed stopped");
                StopOutcome::Inconclusive {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Stops a managed server, consuming its handle.
    pub async fn stop_instance(&self, mut instance: ScribeInstance) -> StopOutcome {
        let port = instance.port;
        self.stop(port, Some(&mut instance)).await
    }

    /// Returns true if `scribe_ctrl status` reports the server alive.
    pub async fn status(&self, port: u16) -> bool {
        match self.ctrl.status(port).await {
            Ok(code) => {
                let alive = code == Some(self.sut.alive_status_code);
                tracing::info!(port, code = ?code, alive, "checked fb303 status");
                alive
            }
            Err(e) => {
                tracing::warn!(port, error = %e, "could not query status");
                false
            }
        }
    }

    /// Returns the server's counters.
    ///
    /// # Errors
    /// Returns an error if the control utility cannot be run.
    pub async fn counters(&self, port: u16) -> Result<BTreeMap<String, i64>> {
        self.ctrl.counters(port).await
    }

    /// Launches an auxiliary process with output in `<name>.out`.
    ///
    /// # Errors
    /// Returns an error if the helper cannot be launched.
    pub fn spawn_helper<I, S>(&self, name: &str, program: &Path, args: I) -> Result<ManagedProcess>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.sut.log_dir.join(format!("{name}.out"));
        ManagedProcess::spawn(name, program, args, &output)
    }

    /// Forcibly terminates a helper. Returns true if it was still running.
    ///
    /// # Errors
    /// Returns an error if the signal cannot be delivered.
    pub async fn kill_helper(&self, helper: &mut ManagedProcess) -> Result<bool> {
        helper.kill().await
    }

    /// Runs a one-shot command to completion and returns its exit code.
    ///
    /// A command killed by a signal reports `-1`.
    ///
    /// # Errors
    /// Returns an error if the command cannot be run.
    pub async fn run_command<I, S>(&self, program: &str, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| SupervisorError::launch(program, e))?;
        let code = status.code().unwrap_or(-1);
        tracing::info!(program, code, "command finished");
        Ok(code)
    }
}
