// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # quill-load
//!
//! Rate-paced synthetic traffic for a Scribe server.
//!
//! Every generator batches messages, sends each batch as one `Log` call,
//! and sleeps out the rest of the batch interval before the next one.
//!
//! - [`stress_test`]: verifiable messages over one session
//! - [`file_cat`]: replay a file line by line
//! - [`many_connections_test`]: many sessions open at once, round-robin
//! - [`super_stress_test`]: one isolated sender per category
//!
//! Non-OK replies and transport failures during a run are logged and
//! counted in the returned [`SendReport`]; delivery is judged afterwards
//! from the server's output files.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quill_load::{StressParams, stress_test};
//! use quill_transport::MemoryConnector;
//!
//! # async fn example() -> quill_load::Result<()> {
//! let connector = MemoryConnector::new();
//! let params = StressParams {
//!     total: 1000,
//!     ..StressParams::new("test", "client1")
//! };
//! let report = stress_test(&connector, &params).await?;
//! assert_eq!(report.attempted, 1000);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod connections;
pub mod error;
pub mod fanout;
pub mod filecat;
pub mod pacing;
pub mod report;
mod session;
pub mod stress;

pub use connections::{ManyConnectionsParams, many_connections_test};
pub use error::{LoadError, Result};
pub use fanout::{
    FanOut, FanOutReport, FanOutRun, ProcessFanOut, RunOutcome, stress_args, super_stress_test,
};
pub use filecat::file_cat;
pub use pacing::{Pacer, batch_interval};
pub use report::SendReport;
pub use stress::{StressParams, stress_test};
