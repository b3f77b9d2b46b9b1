//! Per-run send accounting.

use std::fmt;
use std::time::Duration;

/// What a generator handed to the transport.
///
/// `attempted` counts messages passed to the RPC layer, whatever the
/// outcome; delivery itself is only ever judged from the SUT's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Messages handed to the transport.
    pub attempted: u64,
    /// RPC calls made.
    pub batches: u64,
    /// Calls answered `OK`.
    pub ok_batches: u64,
    /// Calls that failed or returned a non-OK code.
    pub failed_batches: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl SendReport {
    /// Records one batch.
    pub fn record(&mut self, len: usize, ok: bool) {
        self.attempted += len as u64;
        self.batches += 1;
        if ok {
            self.ok_batches += 1;
        } else {
            self.failed_batches += 1;
        }
    }

    /// Adds another run's counts. Elapsed time is the longer of the two,
    /// since merged runs execute concurrently.
    pub fn merge(&mut self, other: &Self) {
        self.attempted += other.attempted;
        self.batches += other.batches;
        self.ok_batches += other.ok_batches;
        self.failed_batches += other.failed_batches;
        self.elapsed = self.elapsed.max(other.elapsed);
    }

    /// Messages per second over the run.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempted as f64 / secs
        } else {
            0.0
        }
    }

    /// Returns true if every batch was answered `OK`.
    #[must_use]
    pub const fn all_ok(&self) -> bool {
        self.failed_batches == 0
    }
}

impl fmt::Display for SendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} messages in {} batches ({} failed) over {:.2?}",
            self.attempted, self.batches, self.failed_batches, self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut report = SendReport::default();
        report.record(20, true);
        report.record(20, false);
        report.record(5, true);
        assert_eq!(report.attempted, 45);
        assert_eq!(report.batches, 3);
        assert_eq!(report.ok_batches, 2);
        assert_eq!(report.failed_batches, 1);
        assert!(!report.all_ok());
    }

    #[test]
    fn test_merge_keeps_longest_elapsed() {
        let mut a = SendReport {
            attempted: 10,
            batches: 1,
            ok_batches: 1,
            failed_batches: 0,
            elapsed: Duration::from_secs(2),
        };
        let b = SendReport {
            attempted: 30,
            batches: 2,
            ok_batches: 1,
            failed_batches: 1,
            elapsed: Duration::from_secs(5),
        };
        a.merge(&b);
        assert_eq!(a.attempted, 40);
        assert_eq!(a.failed_batches, 1);
        assert_eq!(a.elapsed, Duration::from_secs(5));
        assert!((a.throughput() - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_elapsed_throughput() {
        assert_eq!(SendReport::default().throughput(), 0.0);
    }
}
