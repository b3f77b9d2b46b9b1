//! Scenarios end to end against a fake server.
//!
//! `scribed` and `scribe_ctrl` are shell scripts that only manage a pid
//! file. Traffic goes to an in-process connector that appends every entry
//! to a store file under the primary scratch root, the way a file store
//! would.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{Delivery, GracePeriods, HarnessConfig, LogEntry, ResultCode, SutConfig};
use quill_load::StressParams;
use quill_suite::{
    Environment, Result, Scenario, ScenarioContext, ScenarioRegistry, run_scenario, run_suite,
};
use quill_transport::{Connector, LogSink};
use tempfile::TempDir;

const FAKE_SCRIBED: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/pid.$2"
exec sleep 30
"#;

const FAKE_CTRL: &str = r#"#!/bin/sh
pidfile="$(dirname "$0")/pid.$2"
case "$1" in
  stop)
    [ -f "$pidfile" ] || exit 1
    kill "$(cat "$pidfile")" 2>/dev/null
    exit 0
    ;;
  status)
    [ -f "$pidfile" ] && kill -0 "$(cat "$pidfile")" 2>/dev/null && exit 2
    exit 3
    ;;
esac
exit 1
"#;

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).expect("write script");
    let mut perms = std::fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod");
}

/// Maps a category to its store file relative to the root.
type Layout = fn(&str) -> String;

fn numbered(category: &str) -> String {
    format!("{category}/{category}-00000")
}

fn current(category: &str) -> String {
    match category {
        "paramtest" => "paramtest/primary_current".to_string(),
        other => format!("{other}/{other}_current"),
    }
}

#[derive(Clone)]
struct FileStore {
    root: PathBuf,
    layout: Layout,
}

struct FileSession {
    store: FileStore,
}

#[async_trait]
impl LogSink for FileSession {
    async fn log(&mut self, entries: &[LogEntry]) -> quill_transport::Result<ResultCode> {
        for entry in entries {
            let category = entry.category();
            // a real server drops categories it cannot map to a path
            if category.is_empty() || category.contains(['/', '\n', '\0']) {
                continue;
            }
            let path = self.store.root.join((self.store.layout)(category));
            std::fs::create_dir_all(path.parent().expect("parent"))?;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(entry.message())?;
        }
        Ok(ResultCode::Ok)
    }

    async fn close(&mut self) -> quill_transport::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Connector for FileStore {
    async fn connect(&self) -> quill_transport::Result<Box<dyn LogSink>> {
        Ok(Box::new(FileSession {
            store: self.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("file store at {}", self.root.display())
    }
}

struct Fixture {
    dir: TempDir,
    env: Environment,
}

impl Fixture {
    fn new(layout: Layout) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).expect("bin dir");
        write_script(&bin.join("scribed"), FAKE_SCRIBED);
        write_script(&bin.join("scribe_ctrl"), FAKE_CTRL);

        let config = HarnessConfig {
            sut: SutConfig {
                bin_dir: bin.clone(),
                ctrl_dir: bin.clone(),
                conf_dir: bin.clone(),
                log_dir: bin,
                port: 24700,
                secondary_port: 24701,
                ..SutConfig::default()
            },
            grace: GracePeriods {
                startup: Duration::from_millis(200),
                stop: Duration::from_millis(300),
                ..GracePeriods::none()
            },
            paths: quill_core::PathsConfig {
                scratch_roots: vec![dir.path().join("primary"), dir.path().join("secondary")],
            },
            ..HarnessConfig::default()
        };
        let connector = Arc::new(FileStore {
            root: dir.path().join("primary"),
            layout,
        });
        let env = Environment::with_connector(config, connector);
        Self { dir, env }
    }
}

/// Two short runs from one client with numbering restarting in between.
struct Resend;

#[async_trait]
impl Scenario for Resend {
    fn name(&self) -> &str {
        "resend"
    }

    fn description(&self) -> &str {
        "two runs, one seam"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.port;
        ctx.start("resend", port, "scribe.conf.resend").await?;

        let params = StressParams {
            rate: 100_000,
            total: 300,
            batch_size: 20,
            avg_size: 40,
            ..StressParams::new("test", "client1")
        };
        ctx.stress(&params).await?;
        ctx.stress(&params).await?;

        let dir = ctx.primary("test");
        ctx.expect_delivery(&dir, "test-", "client1", Delivery::new(600, 1))?;
        ctx.stop(port).await;
        Ok(())
    }
}

/// Leaves its server running and reads a directory nobody wrote.
struct Abandoned;

#[async_trait]
impl Scenario for Abandoned {
    fn name(&self) -> &str {
        "abandoned"
    }

    fn description(&self) -> &str {
        "aborts with a server still up"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.secondary_port;
        ctx.start("abandoned", port, "scribe.conf.abandoned").await?;
        let dir = ctx.primary("nothing-here");
        ctx.expect_delivery(&dir, "nothing-", "client1", Delivery::new(1, 0))?;
        Ok(())
    }
}

#[tokio::test]
async fn clean_run_passes_with_one_seam_anomaly() {
    let fx = Fixture::new(numbered);
    let outcome = run_scenario(&fx.env, &Resend).await;

    assert!(outcome.passed, "{:?}", outcome.checks);
    assert!(outcome.error.is_none());
    let names: Vec<&str> = outcome.checks.iter().map(|c| c.name.as_str()).collect();
    assert!(names[0].starts_with("start resend"));
    assert!(names.last().expect("checks").starts_with("stop scribed on port 24700"));
}

#[tokio::test]
async fn aborted_scenario_is_torn_down() {
    let fx = Fixture::new(numbered);
    let outcome = run_scenario(&fx.env, &Abandoned).await;

    assert!(!outcome.passed);
    assert!(outcome.error.is_some());
    // teardown still stopped the server it left behind
    let stop = outcome
        .checks
        .iter()
        .find(|c| c.name == "stop scribed on port 24701")
        .expect("stop recorded");
    assert!(stop.passed);
}

#[tokio::test]
async fn param_scenario_finds_its_message() {
    let fx = Fixture::new(current);
    let registry = ScenarioRegistry::builtin();
    let param = registry.get("param").expect("param registered");

    let outcome = run_scenario(&fx.env, param).await;
    assert!(outcome.passed, "{:?}", outcome.checks);
    let stored =
        std::fs::read(fx.dir.path().join("primary/paramtest/primary_current")).expect("stored");
    assert_eq!(stored, b"paramtest");
}

#[tokio::test]
async fn simple_scenario_checks_leading_bytes() {
    let fx = Fixture::new(current);
    let registry = ScenarioRegistry::builtin();
    let simple = registry.get("simple").expect("simple registered");

    let outcome = run_scenario(&fx.env, simple).await;
    assert!(outcome.passed, "{:?}", outcome.checks);
    let alive = outcome
        .checks
        .iter()
        .find(|c| c.name == "scribed on port 24700 alive")
        .expect("status recorded");
    assert!(alive.passed);
}

/// Starts a server, kills it behind the harness's back, then asks for it.
struct Vanished;

#[async_trait]
impl Scenario for Vanished {
    fn name(&self) -> &str {
        "vanished"
    }

    fn description(&self) -> &str {
        "server gone before the status check"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let port = ctx.config().sut.port;
        ctx.start("vanished", port, "scribe.conf.vanished").await?;
        let pid_file = ctx.config().sut.bin_dir.join(format!("pid.{port}"));
        let pid = std::fs::read_to_string(pid_file)?;
        ctx.supervisor().run_command("kill", [pid.trim()]).await?;
        ctx.expect_alive(port).await;
        Ok(())
    }
}

#[tokio::test]
async fn dead_server_fails_status_check() {
    let fx = Fixture::new(numbered);
    let outcome = run_scenario(&fx.env, &Vanished).await;

    assert!(!outcome.passed);
    let alive = outcome
        .checks
        .iter()
        .find(|c| c.name == "scribed on port 24700 alive")
        .expect("status recorded");
    assert!(!alive.passed);
}

#[tokio::test]
async fn suite_report_counts_both() {
    let fx = Fixture::new(numbered);
    let report = run_suite(&fx.env, &[&Resend, &Abandoned], |_| {}).await;

    assert_eq!(report.passed(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.success());
    assert_eq!(report.summary(), "1 tests passed, 1 tests failed.");

    let path = fx.dir.path().join("report.json");
    report.write_json(&path).expect("write report");
    let json = std::fs::read_to_string(&path).expect("read report");
    assert!(json.contains("\"name\": \"abandoned\""));
}
