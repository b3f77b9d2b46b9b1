//! The RPC boundary as the harness sees it.
//!
//! Generators only need "open a session, send a batch, get a result code,
//! close". [`Connector`] opens sessions and [`LogSink`] is one session.

use async_trait::async_trait;
use quill_core::{LogEntry, ResultCode, RpcConfig};

use crate::client::ScribeClient;
use crate::error::Result;

/// One open logging session.
#[async_trait]
pub trait LogSink: Send {
    /// Submits one ordered batch and returns the server's result code.
    async fn log(&mut self, entries: &[LogEntry]) -> Result<ResultCode>;

    /// Closes the session.
    async fn close(&mut self) -> Result<()>;
}

/// Opens fresh, unpooled sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new session.
    async fn connect(&self) -> Result<Box<dyn LogSink>>;

    /// Human-readable target, for logging.
    fn describe(&self) -> String;
}

#[async_trait]
impl LogSink for ScribeClient {
    async fn log(&mut self, entries: &[LogEntry]) -> Result<ResultCode> {
        Self::log(self, entries).await
    }

    async fn close(&mut self) -> Result<()> {
        Self::close(self).await
    }
}

/// Connects to a Scribe server over TCP.
#[derive(Debug, Clone)]
pub struct ScribeConnector {
    host: String,
    port: u16,
    rpc: RpcConfig,
}

impl ScribeConnector {
    /// Creates a connector for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, rpc: RpcConfig) -> Self {
        Self {
            host: host.into(),
            port,
            rpc,
        }
    }

    /// Returns the target host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the target port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl Connector for ScribeConnector {
    async fn connect(&self) -> Result<Box<dyn LogSink>> {
        let client = ScribeClient::connect(&self.host, self.port, &self.rpc).await?;
        Ok(Box::new(client))
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Sends a batch, logging anything other than `OK` instead of failing.
///
/// Returns true only when the server answered `OK`. Transport problems are
/// never fatal to the caller: delivery is judged later from output files.
pub async fn log_or_warn(sink: &mut dyn LogSink, entries: &[LogEntry]) -> bool {
    match sink.log(entries).await {
        Ok(ResultCode::Ok) => true,
        Ok(code) => {
            tracing::warn!(result = %code, entries = entries.len(), "Log returned non-OK result");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, entries = entries.len(), "Log call failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;

    #[tokio::test]
    async fn test_log_or_warn_ok() {
        let connector = MemoryConnector::new();
        let mut sink = connector.connect().await.expect("connect");
        assert!(log_or_warn(sink.as_mut(), &[LogEntry::new("test", b"x".to_vec())]).await);
        assert_eq!(connector.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_log_or_warn_try_later() {
        let connector = MemoryConnector::new().with_result(ResultCode::TryLater);
        let mut sink = connector.connect().await.expect("connect");
        assert!(!log_or_warn(sink.as_mut(), &[LogEntry::new("test", b"x".to_vec())]).await);
    }

    #[tokio::test]
    async fn test_log_or_warn_closed_session() {
        let connector = MemoryConnector::new();
        let mut sink = connector.connect().await.expect("connect");
        sink.close().await.expect("close");
        assert!(!log_or_warn(sink.as_mut(), &[LogEntry::new("test", b"x".to_vec())]).await);
    }

    #[test]
    fn test_scribe_connector_describe() {
        let connector = ScribeConnector::new("localhost", 1463, RpcConfig::default());
        assert_eq!(connector.describe(), "localhost:1463");
        assert_eq!(connector.host(), "localhost");
        assert_eq!(connector.port(), 1463);
    }
}
