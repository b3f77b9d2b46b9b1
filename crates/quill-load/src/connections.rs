//! Many concurrently open sessions driven round-robin from one task.

use quill_core::{LogEntry, generate_random, make_message};
use quill_transport::{Connector, LogSink};
use tokio::time::Instant;

use crate::error::{LoadError, Result};
use crate::pacing::Pacer;
use crate::report::SendReport;
use crate::session;
use crate::stress::validate_common;

/// Parameters for [`many_connections_test`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyConnectionsParams {
    /// Category for every message.
    pub category: String,
    /// Client id embedded in every message.
    pub client_id: String,
    /// Sessions to hold open at once.
    pub num_connections: usize,
    /// Aggregate messages per second across all sessions.
    pub rate: u64,
    /// Messages to send across all sessions.
    pub total: u64,
    /// Messages per call on each session.
    pub batch_size: usize,
    /// Target average message size in bytes.
    pub avg_size: usize,
}

impl ManyConnectionsParams {
    /// Creates parameters with default pacing.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        client_id: impl Into<String>,
        num_connections: usize,
    ) -> Self {
        Self {
            category: category.into(),
            client_id: client_id.into(),
            num_connections,
            rate: 10_000,
            total: 200_000,
            batch_size: 20,
            avg_size: 100,
        }
    }

    /// Validates the parameters.
    ///
    /// # Errors
    /// Returns an error if there are no connections or the run cannot be
    /// paced.
    pub fn validate(&self) -> Result<()> {
        if self.num_connections < 1 {
            return Err(LoadError::invalid(format!(
                "cannot run with {} connections",
                self.num_connections
            )));
        }
        validate_common(&self.category, &self.client_id, self.rate, self.batch_size)
    }

    /// Returns true if rate and total split evenly over the sessions and
    /// batches.
    #[must_use]
    pub fn divides_evenly(&self) -> bool {
        let n = self.num_connections as u64;
        let batch = self.batch_size as u64;
        n > 0
            && batch > 0
            && self.rate % n == 0
            && self.total % n == 0
            && (self.total / n) % batch == 0
    }
}

/// Opens `num_connections` sessions up front, then sends `batch_size`
/// messages on each session per tick until `total` messages have gone out.
///
/// Sequence numbers run across all sessions in send order, so the
/// combined output is verifiable as one client. Sessions are opened
/// directly, never pooled. If any session fails to open, the ones already
/// open are closed and nothing is sent. Close failures are logged and
/// ignored.
///
/// # Errors
/// Returns an error if the parameters are invalid or a session cannot be
/// opened.
pub async fn many_connections_test(
    connector: &dyn Connector,
    params: &ManyConnectionsParams,
) -> Result<SendReport> {
    params.validate()?;
    if !params.divides_evenly() {
        tracing::warn!(
            rate = params.rate,
            total = params.total,
            connections = params.num_connections,
            batch_size = params.batch_size,
            "arguments don't divide evenly, so per-connection counts won't be uniform"
        );
    }

    let rate_per_conn = params.rate as f64 / params.num_connections as f64;
    tracing::info!(
        category = %params.category,
        connections = params.num_connections,
        rate_per_conn,
        total = params.total,
        "starting many connections test"
    );

    let mut sinks: Vec<Box<dyn LogSink>> = Vec::with_capacity(params.num_connections);
    for index in 0..params.num_connections {
        match session::open(connector, index).await {
            Ok(sink) => sinks.push(sink),
            Err(e) => {
                close_all(sinks).await;
                return Err(e);
            }
        }
    }

    let pool = generate_random(params.avg_size * 2);
    let start = Instant::now();
    let mut pacer = Pacer::for_rate(rate_per_conn, params.batch_size);
    let mut report = SendReport::default();
    let mut batch = Vec::with_capacity(params.batch_size);
    let mut sequence = 0u64;

    while sequence < params.total {
        for sink in &mut sinks {
            while batch.len() < params.batch_size && sequence < params.total {
                let message = make_message(&params.client_id, params.avg_size, sequence, &pool);
                batch.push(LogEntry::new(params.category.as_str(), message));
                sequence += 1;
            }
            session::flush(sink.as_mut(), &mut batch, &mut report).await;
        }
        pacer.pace().await;
    }

    close_all(sinks).await;
    report.elapsed = start.elapsed();
    tracing::info!(
        category = %params.category,
        sent = report.attempted,
        failed_batches = report.failed_batches,
        "many connections test completed"
    );
    Ok(report)
}

async fn close_all(sinks: Vec<Box<dyn LogSink>>) {
    for (index, sink) in sinks.into_iter().enumerate() {
        session::close(sink, index).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_transport::MemoryConnector;

    fn quick(n: usize, total: u64, batch_size: usize) -> ManyConnectionsParams {
        ManyConnectionsParams {
            rate: 10_000_000,
            total,
            batch_size,
            ..ManyConnectionsParams::new("test", "client1", n)
        }
    }

    #[tokio::test]
    async fn test_round_robin_across_sessions() {
        let connector = MemoryConnector::new();
        let report = many_connections_test(&connector, &quick(3, 60, 10))
            .await
            .expect("run");

        assert_eq!(report.attempted, 60);
        assert_eq!(connector.sessions(), 3);
        assert_eq!(connector.closed(), 3);
        for session in 0..3 {
            assert_eq!(connector.session_batches(session).len(), 2);
        }
        // first tick: session 0 gets 0..10, session 1 gets 10..20
        let first = &connector.session_batches(1)[0][0];
        assert!(first.message().starts_with(b"client1-10"));
    }

    #[tokio::test]
    async fn test_uneven_split_stops_at_total() {
        let connector = MemoryConnector::new();
        let report = many_connections_test(&connector, &quick(4, 50, 10))
            .await
            .expect("run");
        assert_eq!(report.attempted, 50);
        assert_eq!(connector.entries().len(), 50);
    }

    #[tokio::test]
    async fn test_open_failure_sends_nothing() {
        let connector = MemoryConnector::new().with_open_limit(2);
        let err = many_connections_test(&connector, &quick(5, 100, 10))
            .await
            .expect_err("third open fails");

        assert!(matches!(err, LoadError::Session { index: 2, .. }));
        assert!(connector.entries().is_empty());
        assert_eq!(connector.closed(), 2);
    }

    #[tokio::test]
    async fn test_zero_connections_rejected() {
        let connector = MemoryConnector::new();
        let err = many_connections_test(&connector, &quick(0, 100, 10))
            .await
            .expect_err("no connections");
        assert!(matches!(err, LoadError::InvalidParams(_)));
        assert_eq!(connector.sessions(), 0);
    }

    #[test]
    fn test_divides_evenly() {
        assert!(ManyConnectionsParams::new("test", "client1", 4).divides_evenly());
        assert!(!quick(3, 100, 10).divides_evenly());
        assert!(!quick(4, 120, 20).divides_evenly());
    }
}
