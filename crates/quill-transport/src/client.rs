//! Scribe RPC client over a single TCP session.

use bytes::BytesMut;
use quill_core::{LogEntry, ResultCode, RpcConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::codec::{decode_log_reply, encode_log_call, read_frame, write_frame};
use crate::error::{Result, TransportError};

/// One open session to a Scribe server.
///
/// Sessions are never pooled: every [`ScribeClient::connect`] opens a new
/// TCP connection, which is what lets the many-connections generator force
/// genuinely concurrent sessions onto the SUT.
#[derive(Debug)]
pub struct ScribeClient {
    stream: Option<TcpStream>,
    endpoint: String,
    rpc: RpcConfig,
    seqid: i32,
    scratch: BytesMut,
}

impl ScribeClient {
    /// Opens a session to `host:port`.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established within
    /// `rpc.send_timeout`.
    pub async fn connect(host: &str, port: u16, rpc: &RpcConfig) -> Result<Self> {
        let endpoint = format!("{host}:{port}");
        let stream = tokio::time::timeout(rpc.send_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::timeout("connect", rpc.send_timeout))?
            .map_err(|e| TransportError::connect(&endpoint, e))?;
        stream.set_nodelay(true)?;

        tracing::debug!(endpoint = %endpoint, "opened session");

        Ok(Self {
            stream: Some(stream),
            endpoint,
            rpc: rpc.clone(),
            seqid: 0,
            scratch: BytesMut::new(),
        })
    }

    /// Returns the `host:port` this session talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one batch and waits for its result code.
    ///
    /// # Errors
    /// Returns an error on I/O failure, timeout, a malformed reply or an
    /// application exception. A fatal error closes the session.
    pub async fn log(&mut self, entries: &[LogEntry]) -> Result<ResultCode> {
        let result = self.call(entries).await;
        if let Err(e) = &result {
            if e.is_fatal() || matches!(e, TransportError::Timeout { .. }) {
                // the stream may hold half a frame; it cannot be reused
                self.stream = None;
            }
        }
        result
    }

    async fn call(&mut self, entries: &[LogEntry]) -> Result<ResultCode> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        self.seqid = self.seqid.wrapping_add(1);
        let seqid = self.seqid;

        let payload = encode_log_call(seqid, entries);
        tokio::time::timeout(self.rpc.send_timeout, write_frame(stream, &payload))
            .await
            .map_err(|_| TransportError::timeout("send", self.rpc.send_timeout))??;

        let frame = tokio::time::timeout(
            self.rpc.recv_timeout,
            read_frame(stream, self.rpc.max_frame_bytes, &mut self.scratch),
        )
        .await
        .map_err(|_| TransportError::timeout("receive", self.rpc.recv_timeout))??
        .ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the session before replying",
            ))
        })?;

        decode_log_reply(frame, seqid)
    }

    /// Closes the session.
    ///
    /// # Errors
    /// Returns an error if the shutdown handshake fails.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            tracing::debug!(endpoint = %self.endpoint, "closed session");
        }
        Ok(())
    }

    /// Returns true while the session is usable.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
