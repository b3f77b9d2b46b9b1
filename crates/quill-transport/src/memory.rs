//! In-process sink that records every batch instead of sending it.
//!
//! Used by tests and by `--dry-run`. Clones share state, so a test can hand
//! a clone to a generator and inspect what it sent afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_core::{LogEntry, ResultCode};

use crate::error::{Result, TransportError};
use crate::sink::{Connector, LogSink};

#[derive(Debug)]
struct MemoryState {
    result: ResultCode,
    open_limit: Option<usize>,
    // batches per session, indexed by session id
    sessions: Vec<Vec<Vec<LogEntry>>>,
    closed: usize,
}

/// Connector whose sessions record batches in memory.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// Creates a connector whose sessions answer `OK`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                result: ResultCode::Ok,
                open_limit: None,
                sessions: Vec::new(),
                closed: 0,
            })),
        }
    }

    /// Answers every batch with `code`.
    #[must_use]
    pub fn with_result(self, code: ResultCode) -> Self {
        self.state.lock().result = code;
        self
    }

    /// Refuses to open more than `limit` sessions.
    #[must_use]
    pub fn with_open_limit(self, limit: usize) -> Self {
        self.state.lock().open_limit = Some(limit);
        self
    }

    /// Number of sessions opened so far.
    #[must_use]
    pub fn sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Number of sessions closed so far.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }

    /// Batches received by one session, in order.
    #[must_use]
    pub fn session_batches(&self, session: usize) -> Vec<Vec<LogEntry>> {
        self.state
            .lock()
            .sessions
            .get(session)
            .cloned()
            .unwrap_or_default()
    }

    /// Every batch from every session, sessions in open order.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<LogEntry>> {
        self.state.lock().sessions.iter().flatten().cloned().collect()
    }

    /// Every entry from every session, flattened.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.state
            .lock()
            .sessions
            .iter()
            .flatten()
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn LogSink>> {
        let mut state = self.state.lock();
        if state.open_limit.is_some_and(|limit| state.sessions.len() >= limit) {
            return Err(TransportError::connect(
                "memory",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "session limit reached"),
            ));
        }
        let id = state.sessions.len();
        state.sessions.push(Vec::new());
        drop(state);

        Ok(Box::new(MemorySink {
            id,
            state: Arc::clone(&self.state),
            open: true,
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// One recorded session.
#[derive(Debug)]
pub struct MemorySink {
    id: usize,
    state: Arc<Mutex<MemoryState>>,
    open: bool,
}

impl MemorySink {
    /// Session index within its connector.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn log(&mut self, entries: &[LogEntry]) -> Result<ResultCode> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let mut state = self.state.lock();
        if let Some(session) = state.sessions.get_mut(self.id) {
            session.push(entries.to_vec());
        }
        Ok(state.result)
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.state.lock().closed += 1;
        }
        Ok(())
    }
}
