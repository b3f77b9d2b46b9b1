// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # quill-core
//!
//! Pure building blocks for the Quill conformance harness.
//!
//! - [`LogEntry`] and [`ResultCode`], the unit of traffic and its reply
//! - [`make_message`] and [`SeedPool`], the synthetic message factory
//! - [`result_checker`], the delivery verifier over rotated output files
//! - [`HarnessConfig`], paths, ports, RPC timeouts and grace periods
//!
//! Nothing here talks to the network or spawns processes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quill_core::{Delivery, generate_random, make_message, result_checker};
//! use std::path::Path;
//!
//! let pool = generate_random(200);
//! let line = make_message("client1", 100, 0, &pool);
//! assert_eq!(line, b"client1-0\n");
//!
//! let report = result_checker(Path::new("/tmp/scribetest_/test"), "test-", "client1")?;
//! assert_eq!(report.delivery(), Delivery::new(10000, 0));
//! # Ok::<(), quill_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod entry;
pub mod error;
pub mod message;
pub mod probe;
pub mod verify;

pub use config::{GracePeriods, HarnessConfig, PathsConfig, RpcConfig, SutConfig};
pub use entry::{LogEntry, ResultCode};
pub use error::{CoreError, Result};
pub use message::{SeedPool, generate_random, make_message, padding_len};
pub use probe::{file_contains, file_starts_with};
pub use verify::{
    Delivery, FileTally, VerificationReport, VerificationState, check_files, check_reader,
    output_files, result_checker,
};
