// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # quill-transport
//!
//! The RPC boundary between the harness and a Scribe server.
//!
//! - [`LogSink`] / [`Connector`]: open a session, send a batch, get a
//!   [`ResultCode`](quill_core::ResultCode), close
//! - [`ScribeClient`] / [`ScribeConnector`]: Thrift framed binary over TCP
//! - [`MemoryConnector`]: records batches in memory for tests and dry runs
//! - [`log_or_warn`]: send and log non-OK outcomes without failing

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod codec;
pub mod error;
pub mod memory;
pub mod sink;

pub use client::ScribeClient;
pub use codec::{LogCall, MessageType};
pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemorySink};
pub use sink::{Connector, LogSink, ScribeConnector, log_or_warn};
