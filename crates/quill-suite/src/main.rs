//! Quill conformance harness binary.
//!
//! # Usage
//!
//! ```bash
//! # Run the default suite against scribed on localhost:1463
//! quill --config quill.toml run
//!
//! # Run named scenarios and keep a JSON report
//! quill run basic buffer --report results.json
//!
//! # Drive load by hand
//! quill superstress --client client1 rock paper scissors
//! quill filecat /var/log/messages syslog
//!
//! # Verify output files written by any run
//! quill check client1 /tmp/scribetest_/test/test-00000 /tmp/scribetest_/test/test-00001
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use quill_core::{HarnessConfig, check_files};
use quill_load::{
    FanOut, ManyConnectionsParams, ProcessFanOut, SendReport, StressParams, file_cat,
    many_connections_test, stress_test, super_stress_test,
};
use quill_suite::{DEFAULT_SUITE, Environment, ScenarioRegistry, run_suite};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Scribe conformance harness
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Conformance and load harness for Scribe log servers")]
#[command(version)]
struct Cli {
    /// Harness configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Record traffic in memory instead of sending it
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scenarios (the default suite when none are named)
    Run {
        /// Scenario names
        scenarios: Vec<String>,

        /// Write a JSON report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Isolate fan-out senders in child processes instead of tasks
        #[arg(long)]
        process_fanout: bool,
    },

    /// List scenarios
    List,

    /// Send one category's stress run (used by process fan-out)
    #[command(hide = true)]
    Stress(StressArgs),

    /// One concurrent sender per category
    Superstress {
        /// Client id embedded in messages
        #[arg(long, default_value = "client1")]
        client: String,

        /// Categories to send to
        #[arg(default_values = ["rock", "paper", "scissors"])]
        categories: Vec<String>,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Send a file's lines verbatim
    Filecat {
        /// File to send
        file: PathBuf,

        /// Category to send to
        #[arg(default_value = "filecattest")]
        category: String,

        /// Messages per second
        #[arg(long, default_value_t = 10_000)]
        rate: u64,

        /// Messages per call
        #[arg(long, default_value_t = 20)]
        batch_size: usize,
    },

    /// One client spread across several sessions
    ManyConnections {
        /// Category to send to
        #[arg(long, default_value = "test")]
        category: String,

        /// Client id embedded in messages
        #[arg(long, default_value = "client1")]
        client: String,

        /// Concurrent sessions
        #[arg(long, default_value_t = 10)]
        connections: usize,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Verify output files for one client, in rotation order
    Check {
        /// Client id to verify
        client: String,

        /// Output files, oldest first
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
struct LoadArgs {
    /// Messages per second
    #[arg(long, default_value_t = 10_000)]
    rate: u64,

    /// Messages to send
    #[arg(long, default_value_t = 200_000)]
    total: u64,

    /// Messages per call
    #[arg(long, default_value_t = 20)]
    batch_size: usize,

    /// Average message size in bytes
    #[arg(long, default_value_t = 100)]
    avg_size: usize,
}

#[derive(Args, Debug)]
struct StressArgs {
    #[arg(long)]
    category: String,

    #[arg(long)]
    client: String,

    #[command(flatten)]
    load: LoadArgs,

    /// Spread messages over `<category>1..=<category>N`
    #[arg(long, default_value_t = 1)]
    fanout: u32,

    /// First sequence number
    #[arg(long, default_value_t = 0)]
    first_sequence: u64,

    /// RNG seed for category fan-out
    #[arg(long)]
    seed: Option<u64>,
}

impl StressArgs {
    fn params(&self) -> StressParams {
        StressParams {
            rate: self.load.rate,
            total: self.load.total,
            batch_size: self.load.batch_size,
            avg_size: self.load.avg_size,
            category_fanout: self.fanout,
            first_sequence: self.first_sequence,
            seed: self.seed,
            ..StressParams::new(&self.category, &self.client)
        }
    }
}

impl Cli {
    /// Global flags repeated for child processes.
    fn child_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(config) = &self.config {
            args.push("--config".into());
            args.push(config.clone().into_os_string());
        }
        args.push("--log-level".into());
        args.push(self.log_level.clone().into());
        if self.dry_run {
            args.push("--dry-run".into());
        }
        args
    }

    fn load_config(&self) -> anyhow::Result<HarnessConfig> {
        match &self.config {
            Some(path) => HarnessConfig::load(path)
                .with_context(|| format!("loading {}", path.display())),
            None => Ok(HarnessConfig::default()),
        }
    }

    fn process_fanout(&self) -> anyhow::Result<FanOut> {
        let fanout = ProcessFanOut::current_exe()?.with_args(self.child_args());
        Ok(FanOut::Processes(fanout))
    }
}

fn print_send_report(report: &SendReport) {
    println!(
        "sent {} messages in {} batches ({} failed) in {:.1?}",
        report.attempted, report.batches, report.failed_batches, report.elapsed
    );
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = cli.load_config()?;
    let env = if cli.dry_run {
        tracing::info!("dry run: traffic is recorded in memory");
        Environment::dry_run(config)
    } else {
        Environment::tcp(config)
    };

    match &cli.command {
        Command::Run {
            scenarios,
            report,
            process_fanout,
        } => {
            let registry = ScenarioRegistry::builtin();
            let selected = if scenarios.is_empty() {
                registry.resolve(DEFAULT_SUITE)?
            } else {
                registry.resolve(scenarios)?
            };
            let env = if *process_fanout {
                env.with_fanout(cli.process_fanout()?)
            } else {
                env
            };

            let suite = run_suite(&env, &selected, |outcome| {
                let verdict = if outcome.passed { "succeeded" } else { "FAILED" };
                println!("Running test {} ... {verdict}", outcome.name);
                for check in outcome.failures() {
                    println!("  {check}");
                }
                if let Some(error) = &outcome.error {
                    println!("  aborted: {error}");
                }
            })
            .await;

            println!("{}", suite.summary());
            if let Some(path) = report {
                suite
                    .write_json(path)
                    .with_context(|| format!("writing report to {}", path.display()))?;
            }
            Ok(exit_code(suite.success()))
        }

        Command::List => {
            let registry = ScenarioRegistry::builtin();
            for scenario in registry.iter() {
                let marker = if DEFAULT_SUITE.iter().any(|s| *s == scenario.name()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {:<14} {}", scenario.name(), scenario.description());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Stress(args) => {
            let report = stress_test(env.connector(), &args.params()).await?;
            tracing::info!(
                category = %args.category,
                attempted = report.attempted,
                failed_batches = report.failed_batches,
                "stress run finished"
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::Superstress {
            client,
            categories,
            load,
        } => {
            let first = categories.first().map_or("rock", String::as_str);
            let template = StressParams {
                rate: load.rate,
                total: load.total,
                batch_size: load.batch_size,
                avg_size: load.avg_size,
                ..StressParams::new(first, client.as_str())
            };
            let fanout = if cli.dry_run {
                env.fanout().clone()
            } else {
                cli.process_fanout()?
            };
            let report = super_stress_test(&fanout, categories, &template).await?;
            for run in &report.runs {
                println!("{}: {:?}", run.category, run.outcome);
            }
            println!("finished in {:.1?}", report.elapsed);
            Ok(exit_code(report.all_succeeded()))
        }

        Command::Filecat {
            file,
            category,
            rate,
            batch_size,
        } => {
            let report = file_cat(env.connector(), file, category, *rate, *batch_size).await?;
            print_send_report(&report);
            Ok(exit_code(report.all_ok()))
        }

        Command::ManyConnections {
            category,
            client,
            connections,
            load,
        } => {
            let params = ManyConnectionsParams {
                rate: load.rate,
                total: load.total,
                batch_size: load.batch_size,
                avg_size: load.avg_size,
                ..ManyConnectionsParams::new(category.as_str(), client.as_str(), *connections)
            };
            let report = many_connections_test(env.connector(), &params).await?;
            print_send_report(&report);
            Ok(exit_code(report.all_ok()))
        }

        Command::Check { client, files } => {
            let report = check_files(client, files)?;
            for tally in &report.files {
                println!("{}: {}", tally.path.display(), tally.delivery);
            }
            println!("{client}: {}", report.delivery());
            Ok(ExitCode::SUCCESS)
        }
    }
}
