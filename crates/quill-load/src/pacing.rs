//! Batch pacing.
//!
//! After each batch the pacer sleeps out whatever remains of the batch
//! interval, measured from the previous batch. The reference point is taken
//! *before* sleeping, so time spent inside the RPC is never made up on later
//! batches: under load, actual throughput falls below the target rate.

use std::time::Duration;

use tokio::time::Instant;

/// Spaces batches `interval` apart.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last_send: Instant,
}

impl Pacer {
    /// Creates a pacer with a fixed interval, starting now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_send: Instant::now(),
        }
    }

    /// Creates a pacer sending `batch_size` messages per tick at `rate`
    /// messages per second.
    #[must_use]
    pub fn for_rate(rate: f64, batch_size: usize) -> Self {
        Self::new(batch_interval(rate, batch_size))
    }

    /// Returns the interval between batches.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits out the rest of the current interval.
    ///
    /// Returns how long it slept.
    pub async fn pace(&mut self) -> Duration {
        let now = Instant::now();
        let deadline = self.last_send + self.interval;
        self.last_send = now;

        let wait = deadline.saturating_duration_since(now);
        if !wait.is_zero() {
            tracing::trace!(wait = ?wait, "pacing");
            tokio::time::sleep(wait).await;
        }
        wait
    }
}

/// Seconds per batch at `rate` messages per second.
#[must_use]
pub fn batch_interval(rate: f64, batch_size: usize) -> Duration {
    if rate <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(batch_size as f64 / rate).unwrap_or(Duration::MAX)
}
