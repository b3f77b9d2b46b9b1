// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # quill-supervisor
//!
//! Lifecycle management for the Scribe servers a scenario drives.
//!
//! - [`ProcessSupervisor`]: start / stop / status / counters, helpers and
//!   one-shot commands
//! - [`StopOutcome`]: confirmed stopped, forcibly killed, or inconclusive
//! - [`ManagedProcess`]: a child with its output redirected to a file
//!
//! All synchronisation with the server is by fixed grace periods taken
//! from [`GracePeriods`](quill_core::GracePeriods).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod control;
pub mod error;
pub mod process;
pub mod supervisor;

pub use control::{ControlUtility, parse_counters};
pub use error::{Result, SupervisorError};
pub use process::ManagedProcess;
pub use supervisor::{ProcessSupervisor, ScribeInstance, StopOutcome};
