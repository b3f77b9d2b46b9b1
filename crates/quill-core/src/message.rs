//! Synthetic message factory.
//!
//! Messages have the shape `<client_id>-<sequence>[-<padding_len>-<padding>]\n`.
//! The Delivery Verifier relies on the first two fields; the padding only
//! exists to push message sizes around a target average.

/// Fixed text doubled until a padding pool is large enough.
const SEED: &[u8] =
    b"qwertyuiop%sasdfg;hjkl[zxcvbnm/poiu]ytrewq;lkjh,gfdsamnbvcxzQWERTYUIOPlogpadASDFGHJKL";

/// Bytes subtracted from the average size before computing padding.
///
/// Covers the separators, the sequence digits and the padding length digits
/// of a typical message.
const FIXED_OVERHEAD: i64 = 10;

/// Reusable pool of filler bytes for message padding.
///
/// Built once per generator invocation; not a source of entropy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPool(Vec<u8>);

impl SeedPool {
    /// Builds a pool of at least `min_size` bytes by doubling [`SEED`].
    #[must_use]
    pub fn generate(min_size: usize) -> Self {
        let mut pool = SEED.to_vec();
        while pool.len() < min_size {
            pool.extend_from_within(..);
        }
        Self(pool)
    }

    /// Returns the pool contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the pool length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds a padding pool of at least `min_size` bytes.
#[must_use]
pub fn generate_random(min_size: usize) -> SeedPool {
    SeedPool::generate(min_size)
}

/// Computes the padding length for a message.
///
/// The length oscillates over `0..2 * budget` as the sequence advances, so
/// the average message size tracks `avg_size` while staying reproducible.
#[must_use]
pub fn padding_len(client_id: &str, avg_size: usize, sequence: u64) -> usize {
    let budget = avg_size as i64 - client_id.len() as i64 - FIXED_OVERHEAD;
    if budget > 0 {
        (sequence % (budget as u64 * 2)) as usize
    } else {
        0
    }
}

/// Builds one synthetic message.
///
/// Same inputs always produce byte-identical output. Padding is truncated
/// to the pool length if the pool is too small for the requested size.
#[must_use]
pub fn make_message(client_id: &str, avg_size: usize, sequence: u64, pool: &SeedPool) -> Vec<u8> {
    let padding = padding_len(client_id, avg_size, sequence).min(pool.len());

    let mut message = Vec::with_capacity(client_id.len() + padding + 24);
    message.extend_from_slice(client_id.as_bytes());
    message.push(b'-');
    message.extend_from_slice(sequence.to_string().as_bytes());
    if padding > 0 {
        message.push(b'-');
        message.extend_from_slice(padding.to_string().as_bytes());
        message.push(b'-');
        message.extend_from_slice(&pool.as_bytes()[..padding]);
    }
    message.push(b'\n');
    message
}
