// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # quill-suite
//!
//! Scenario orchestration for the Quill conformance harness.
//!
//! A [`Scenario`] drives real `scribed` processes through a
//! [`ScenarioContext`]: it starts servers, sends traffic, waits out grace
//! periods, and records [`Check`]s against the files the servers wrote.
//! The runner resets scratch roots before each scenario, stops anything
//! left running afterwards, and tallies a [`SuiteReport`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use quill_core::HarnessConfig;
//! use quill_suite::{DEFAULT_SUITE, Environment, ScenarioRegistry, run_suite};
//!
//! # async fn example() -> quill_suite::Result<()> {
//! let env = Environment::tcp(HarnessConfig::default());
//! let registry = ScenarioRegistry::builtin();
//! let scenarios = registry.resolve(DEFAULT_SUITE)?;
//!
//! let report = run_suite(&env, &scenarios, |outcome| {
//!     println!("{}: {}", outcome.name, outcome.passed);
//! })
//! .await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod report;
pub mod scenario;
pub mod scenarios;
pub mod suite;

pub use context::{Environment, ScenarioContext};
pub use error::{Result, SuiteError};
pub use report::{Check, ScenarioOutcome, SuiteReport};
pub use scenario::{DEFAULT_SUITE, Scenario, ScenarioRegistry};
pub use suite::{clean_scratch, run_scenario, run_suite};
