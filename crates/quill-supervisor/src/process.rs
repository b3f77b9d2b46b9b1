//! A child process owned by the supervisor.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::{Result, SupervisorError};

/// A launched process with combined stdout/stderr redirected to a file.
///
/// Dropping a `ManagedProcess` kills it, so a harness that bails out early
/// never leaves a server holding its port.
#[derive(Debug)]
pub struct ManagedProcess {
    name: String,
    pid: u32,
    output: PathBuf,
    child: Child,
}

impl ManagedProcess {
    /// Launches `program` with `args`, writing its output to `output`.
    ///
    /// # Errors
    /// Returns an error if the output file cannot be created or the program
    /// cannot be executed.
    pub fn spawn<I, S>(name: &str, program: &Path, args: I, output: &Path) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let stdout = std::fs::File::create(output)?;
        let stderr = stdout.try_clone()?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SupervisorError::launch(program, e))?;

        let pid = child.id().ok_or_else(|| {
            SupervisorError::NotFound(format!("{name} exited before reporting a pid"))
        })?;

        tracing::info!(
            name,
            pid,
            program = %program.display(),
            output = %output.display(),
            "spawned process"
        );

        Ok(Self {
            name: name.to_string(),
            pid,
            output: output.to_path_buf(),
            child,
        })
    }

    /// Returns the process name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the OS process id captured at launch.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the file receiving the process output.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Reaps the child if it has exited. Never blocks.
    ///
    /// # Errors
    /// Returns an error if the exit status cannot be queried.
    pub fn has_exited(&mut self) -> Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    /// Forcibly terminates the process.
    ///
    /// Returns `true` if the process was still alive and has now been killed,
    /// `false` if it had already exited. An exited child is reaped first so
    /// it is never mistaken for a live one.
    ///
    /// # Errors
    /// Returns an error if the signal cannot be delivered.
    pub async fn kill(&mut self) -> Result<bool> {
        if self.has_exited()? {
            tracing::debug!(name = %self.name, pid = self.pid, "already exited");
            return Ok(false);
        }

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            // PID always fits in i32 on Unix
            let pid = Pid::from_raw(self.pid as i32);
            match signal::kill(pid, Signal::SIGKILL) {
                Ok(()) => {}
                Err(Errno::ESRCH) => return Ok(false),
                Err(e) => return Err(SupervisorError::signal(self.pid, e.to_string())),
            };
        }

        #[cfg(not(unix))]
        self.child.start_kill()?;

        self.child.wait().await?;
        tracing::warn!(name = %self.name, pid = self.pid, "killed process");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_redirects_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("echo.out");
        let mut proc = ManagedProcess::spawn(
            "echo",
            Path::new("/bin/sh"),
            ["-c", "echo to-stdout; echo to-stderr >&2"],
            &out,
        )
        .expect("spawn");

        assert!(proc.pid() > 0);
        assert_eq!(proc.name(), "echo");
        // wait for the shell to finish
        for _ in 0..100 {
            if proc.has_exited().expect("try_wait") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let text = std::fs::read_to_string(proc.output()).expect("read output");
        assert!(text.contains("to-stdout"));
        assert!(text.contains("to-stderr"));
    }

    #[tokio::test]
    async fn test_kill_live_process() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut proc = ManagedProcess::spawn(
            "sleeper",
            Path::new("/bin/sleep"),
            ["30"],
            &dir.path().join("sleep.out"),
        )
        .expect("spawn");

        assert!(proc.kill().await.expect("kill"));
        assert!(proc.has_exited().expect("try_wait"));
        // second kill finds nothing alive
        assert!(!proc.kill().await.expect("kill"));
    }

    #[tokio::test]
    async fn test_kill_exited_process() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut proc = ManagedProcess::spawn(
            "true",
            Path::new("/bin/sh"),
            ["-c", "exit 0"],
            &dir.path().join("true.out"),
        )
        .expect("spawn");
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!proc.kill().await.expect("kill"));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ManagedProcess::spawn(
            "missing",
            Path::new("/nonexistent/scribed"),
            ["-p", "1463"],
            &dir.path().join("missing.out"),
        )
        .expect_err("must fail");
        assert!(matches!(err, SupervisorError::Launch { .. }));
    }
}
