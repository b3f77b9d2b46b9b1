//! Quill: conformance and load harness for Scribe log servers.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use quill::prelude::*;
//!
//! # async fn example() -> quill::suite::Result<()> {
//! let env = Environment::tcp(HarnessConfig::default());
//! let registry = ScenarioRegistry::builtin();
//! let report = run_suite(&env, &registry.resolve(&["basic"])?, |_| {}).await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub use quill_core as core;
pub use quill_load as load;
pub use quill_suite as suite;
pub use quill_supervisor as supervisor;
pub use quill_transport as transport;

/// Prelude module for common imports.
pub mod prelude {
    pub use quill_core::{Delivery, HarnessConfig, LogEntry, ResultCode, result_checker};
    pub use quill_load::{
        StressParams, file_cat, many_connections_test, stress_test, super_stress_test,
    };
    pub use quill_suite::{
        Check, Environment, Scenario, ScenarioContext, ScenarioRegistry, SuiteReport, run_suite,
    };
    pub use quill_supervisor::{ProcessSupervisor, StopOutcome};
    pub use quill_transport::{Connector, LogSink, ScribeConnector};
}
