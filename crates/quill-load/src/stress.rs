//! Single-session synthetic traffic.

use quill_core::{LogEntry, generate_random, make_message};
use quill_transport::Connector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use crate::error::{LoadError, Result};
use crate::pacing::Pacer;
use crate::report::SendReport;
use crate::session;

/// Parameters for one [`stress_test`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressParams {
    /// Base category.
    pub category: String,
    /// Client id embedded in every message.
    pub client_id: String,
    /// Target messages per second.
    pub rate: u64,
    /// Messages to send.
    pub total: u64,
    /// Messages per RPC call.
    pub batch_size: usize,
    /// Target average message size in bytes.
    pub avg_size: usize,
    /// When above 1, each message goes to `<category><n>` with `n` drawn
    /// uniformly from `1..=category_fanout`.
    pub category_fanout: u32,
    /// Sequence number of the first message.
    pub first_sequence: u64,
    /// Seed for category selection; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for StressParams {
    fn default() -> Self {
        Self {
            category: "test".to_string(),
            client_id: "client1".to_string(),
            rate: 10_000,
            total: 200_000,
            batch_size: 20,
            avg_size: 100,
            category_fanout: 1,
            first_sequence: 0,
            seed: None,
        }
    }
}

impl StressParams {
    /// Creates parameters with default pacing for `category` and `client_id`.
    #[must_use]
    pub fn new(category: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Same parameters, different base category.
    #[must_use]
    pub fn for_category(&self, category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..self.clone()
        }
    }

    /// Validates the parameters.
    ///
    /// # Errors
    /// Returns an error if the run cannot be paced or its messages could
    /// not be attributed back to the client.
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.category, &self.client_id, self.rate, self.batch_size)?;
        if self.category_fanout == 0 {
            return Err(LoadError::invalid("category_fanout must be at least 1"));
        }
        Ok(())
    }

    fn category_for(&self, rng: &mut StdRng) -> String {
        if self.category_fanout > 1 {
            format!("{}{}", self.category, rng.gen_range(1..=self.category_fanout))
        } else {
            self.category.clone()
        }
    }
}

pub(crate) fn validate_common(
    category: &str,
    client_id: &str,
    rate: u64,
    batch_size: usize,
) -> Result<()> {
    if category.is_empty() {
        return Err(LoadError::invalid("category cannot be empty"));
    }
    if client_id.is_empty() {
        return Err(LoadError::invalid("client id cannot be empty"));
    }
    // the verifier splits on '-', so such a client could never be matched
    if client_id.contains('-') || client_id.contains('\n') {
        return Err(LoadError::invalid(format!(
            "client id {client_id:?} cannot contain '-' or newlines"
        )));
    }
    if rate == 0 {
        return Err(LoadError::invalid("rate must be positive"));
    }
    if batch_size == 0 {
        return Err(LoadError::invalid("batch size must be positive"));
    }
    Ok(())
}

/// Sends `params.total` synthetic messages over one session.
///
/// Messages are batched `batch_size` at a time and paced to `rate`. A
/// trailing partial batch is flushed, so exactly `total` messages are
/// handed to the transport. Non-OK replies are logged, not raised.
///
/// # Errors
/// Returns an error if the parameters are invalid or the session cannot be
/// opened.
pub async fn stress_test(connector: &dyn Connector, params: &StressParams) -> Result<SendReport> {
    params.validate()?;

    tracing::info!(
        category = %params.category,
        client = %params.client_id,
        rate = params.rate,
        total = params.total,
        batch_size = params.batch_size,
        avg_size = params.avg_size,
        fanout = params.category_fanout,
        "starting stress test"
    );

    let pool = generate_random(params.avg_size * 2);
    let mut rng = params
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let mut sink = session::open(connector, 0).await?;

    let start = Instant::now();
    let mut pacer = Pacer::for_rate(params.rate as f64, params.batch_size);
    let mut report = SendReport::default();
    let mut batch = Vec::with_capacity(params.batch_size);

    for i in 0..params.total {
        let sequence = params.first_sequence + i;
        let message = make_message(&params.client_id, params.avg_size, sequence, &pool);
        batch.push(LogEntry::new(params.category_for(&mut rng), message));

        if batch.len() >= params.batch_size {
            session::flush(sink.as_mut(), &mut batch, &mut report).await;
            pacer.pace().await;
        }
    }
    session::flush(sink.as_mut(), &mut batch, &mut report).await;
    session::close(sink, 0).await;

    report.elapsed = start.elapsed();
    tracing::info!(
        category = %params.category,
        sent = report.attempted,
        batches = report.batches,
        failed_batches = report.failed_batches,
        throughput = format!("{:.2}", report.throughput()),
        "stress test completed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ResultCode;
    use quill_transport::MemoryConnector;

    fn quick(total: u64) -> StressParams {
        StressParams {
            rate: 1_000_000,
            total,
            ..StressParams::new("test", "client1")
        }
    }

    #[tokio::test]
    async fn test_sends_total_in_order() {
        let connector = MemoryConnector::new();
        let report = stress_test(&connector, &quick(100)).await.expect("run");

        assert_eq!(report.attempted, 100);
        assert_eq!(report.batches, 5);
        let entries = connector.entries();
        assert_eq!(entries.len(), 100);
        assert!(entries[0].message().starts_with(b"client1-0"));
        assert!(entries[99].message().starts_with(b"client1-99"));
        assert!(entries.iter().all(|e| e.category() == "test"));
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_trailing_partial_batch_is_flushed() {
        let connector = MemoryConnector::new();
        let report = stress_test(&connector, &quick(45)).await.expect("run");
        assert_eq!(report.attempted, 45);
        let sizes: Vec<_> = connector.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
    }

    #[tokio::test]
    async fn test_first_sequence_continues_numbering() {
        let connector = MemoryConnector::new();
        let params = StressParams {
            first_sequence: 10_000,
            ..quick(20)
        };
        stress_test(&connector, &params).await.expect("run");
        assert!(connector.entries()[0].message().starts_with(b"client1-10000"));
    }

    #[tokio::test]
    async fn test_category_fanout_stays_in_range() {
        let connector = MemoryConnector::new();
        let params = StressParams {
            category_fanout: 3,
            seed: Some(7),
            ..quick(300)
        };
        stress_test(&connector, &params).await.expect("run");

        let entries = connector.entries();
        for suffix in ["1", "2", "3"] {
            let category = format!("test{suffix}");
            assert!(entries.iter().any(|e| e.category() == category));
        }
        assert!(
            entries
                .iter()
                .all(|e| matches!(e.category(), "test1" | "test2" | "test3"))
        );
    }

    #[tokio::test]
    async fn test_seeded_fanout_is_reproducible() {
        let params = StressParams {
            category_fanout: 5,
            seed: Some(42),
            ..quick(50)
        };
        let a = MemoryConnector::new();
        let b = MemoryConnector::new();
        stress_test(&a, &params).await.expect("run");
        stress_test(&b, &params).await.expect("run");
        assert_eq!(a.entries(), b.entries());
    }

    #[tokio::test]
    async fn test_non_ok_replies_are_counted_not_raised() {
        let connector = MemoryConnector::new().with_result(ResultCode::TryLater);
        let report = stress_test(&connector, &quick(40)).await.expect("run");
        assert_eq!(report.attempted, 40);
        assert_eq!(report.failed_batches, 2);
    }

    #[tokio::test]
    async fn test_open_failure_aborts() {
        let connector = MemoryConnector::new().with_open_limit(0);
        let err = stress_test(&connector, &quick(40)).await.expect_err("no session");
        assert!(matches!(err, LoadError::Session { index: 0, .. }));
    }

    #[test]
    fn test_validate() {
        assert!(StressParams::default().validate().is_ok());
        let bad = [
            StressParams {
                rate: 0,
                ..StressParams::default()
            },
            StressParams {
                batch_size: 0,
                ..StressParams::default()
            },
            StressParams {
                category_fanout: 0,
                ..StressParams::default()
            },
            StressParams::new("test", "client-1"),
            StressParams::new("", "client1"),
        ];
        for params in bad {
            assert!(params.validate().is_err(), "{params:?}");
        }
    }

    #[test]
    fn test_for_category() {
        let base = StressParams::new("rock", "client1");
        let paper = base.for_category("paper");
        assert_eq!(paper.category, "paper");
        assert_eq!(paper.client_id, "client1");
        assert_eq!(paper.total, base.total);
    }
}
