//! Delivery verification over a rotated set of SUT output files.
//!
//! The SUT persists each category as append-only files sharing a prefix.
//! Lexicographic file-name order stands in for write order, so scanning the
//! sorted set reconstructs each client's submission order. A single cursor
//! is carried across file boundaries: continuity is checked across
//! rotation, not just within one file.
//!
//! Every call starts from a fresh [`VerificationState`]. Because the output
//! is append-only, calling again on a growing directory yields cumulative
//! totals rather than a delta.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// The `{count, out_of_order}` pair scenarios compare against literals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Delivery {
    /// Lines attributed to the client.
    pub count: u64,
    /// Attributed lines whose sequence did not follow the previous one.
    pub out_of_order: u64,
}

impl Delivery {
    /// Creates a delivery pair.
    #[must_use]
    pub const fn new(count: u64, out_of_order: u64) -> Self {
        Self {
            count,
            out_of_order,
        }
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{count: {}, out_of_order: {}}}",
            self.count, self.out_of_order
        )
    }
}

/// Ordering cursor and counters for one verifier invocation.
///
/// Never persisted between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationState {
    /// Last well-formed sequence observed, starting at -1.
    last_entry: i64,
    count: u64,
    out_of_order: u64,
}

impl Default for VerificationState {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationState {
    /// Creates a state expecting sequence 0 next.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_entry: -1,
            count: 0,
            out_of_order: 0,
        }
    }

    /// Returns the last well-formed sequence observed.
    #[must_use]
    pub const fn last_entry(&self) -> i64 {
        self.last_entry
    }

    /// Returns the running totals.
    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        Delivery::new(self.count, self.out_of_order)
    }

    /// Records one line attributed to the client.
    ///
    /// The cursor always moves to the observed value, never to the expected
    /// one, so a single gap yields a single anomaly. A malformed token is one
    /// anomaly and leaves the cursor in place: the next numeric token is
    /// still compared against the last one that parsed.
    fn observe(&mut self, token: &[u8]) {
        self.count += 1;
        let Some(seq) = parse_sequence(token) else {
            self.out_of_order += 1;
            tracing::debug!(
                token = %String::from_utf8_lossy(token),
                follows = self.last_entry,
                "malformed sequence token"
            );
            return;
        };
        if self.last_entry.checked_add(1) != Some(seq) {
            self.out_of_order += 1;
            tracing::debug!(entry = seq, follows = self.last_entry, "out of order entry");
        }
        self.last_entry = seq;
    }
}

/// Per-file result of a verifier scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTally {
    /// The file that was read.
    pub path: PathBuf,
    /// Counts contributed by this file alone.
    pub delivery: Delivery,
}

/// Result of verifying one client across a file set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Lines attributed to the client across every file.
    pub count: u64,
    /// Ordering anomalies across every file.
    pub out_of_order: u64,
    /// Per-file contributions, in scan order.
    pub files: Vec<FileTally>,
}

impl VerificationReport {
    /// Returns the comparable totals.
    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        Delivery::new(self.count, self.out_of_order)
    }
}

/// Splits a line into its client field and sequence token.
///
/// The client is everything before the first `-`; the token runs to the
/// second `-` or the end of the line. Lines without a `-` have no client.
fn split_fields(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut fields = line.splitn(3, |b| *b == b'-');
    let client = fields.next()?;
    let token = fields.next()?;
    Some((client, token))
}

fn parse_sequence(token: &[u8]) -> Option<i64> {
    std::str::from_utf8(token).ok()?.trim().parse().ok()
}

/// Folds every line of `reader` into `state`.
///
/// Returns the updated state and the counts this reader contributed.
pub fn check_reader<R: BufRead>(
    mut reader: R,
    client_id: &str,
    mut state: VerificationState,
) -> std::io::Result<(VerificationState, Delivery)> {
    let before = state.delivery();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        if let Some((client, token)) = split_fields(&line) {
            if client == client_id.as_bytes() {
                state.observe(token);
            }
        }
    }
    let after = state.delivery();
    Ok((
        state,
        Delivery::new(
            after.count - before.count,
            after.out_of_order - before.out_of_order,
        ),
    ))
}

/// Folds one output file into `state`.
pub fn check_file(
    path: &Path,
    client_id: &str,
    state: VerificationState,
) -> Result<(VerificationState, FileTally)> {
    let file = File::open(path).map_err(|e| CoreError::file(path, e))?;
    let (state, delivery) =
        check_reader(BufReader::new(file), client_id, state).map_err(|e| CoreError::file(path, e))?;

    tracing::info!(
        file = %path.display(),
        count = delivery.count,
        out_of_order = delivery.out_of_order,
        "checked result file"
    );

    Ok((
        state,
        FileTally {
            path: path.to_path_buf(),
            delivery,
        },
    ))
}

/// Verifies an explicit, already-ordered list of files.
pub fn check_files<P: AsRef<Path>>(client_id: &str, files: &[P]) -> Result<VerificationReport> {
    let (state, tallies) = files.iter().try_fold(
        (VerificationState::new(), Vec::with_capacity(files.len())),
        |(state, mut tallies), path| {
            let (state, tally) = check_file(path.as_ref(), client_id, state)?;
            tallies.push(tally);
            Ok::<_, CoreError>((state, tallies))
        },
    )?;

    let totals = state.delivery();
    tracing::info!(
        client = client_id,
        count = totals.count,
        out_of_order = totals.out_of_order,
        "verification total"
    );

    Ok(VerificationReport {
        count: totals.count,
        out_of_order: totals.out_of_order,
        files: tallies,
    })
}

/// Lists files in `dir` whose names start with `prefix`, sorted by name.
pub fn output_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| CoreError::directory(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::directory(dir, e))?;
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let name = entry.file_name();
        if name.as_encoded_bytes().starts_with(prefix.as_bytes()) {
            names.push(name);
        }
    }
    names.sort_by(|a, b| a.as_encoded_bytes().cmp(b.as_encoded_bytes()));

    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// Counts and order-checks `client_id`'s lines across `dir/<prefix>*`.
///
/// Read-only with respect to the filesystem: two calls on an unchanged
/// directory return identical results.
pub fn result_checker(dir: &Path, prefix: &str, client_id: &str) -> Result<VerificationReport> {
    let files = output_files(dir, prefix)?;
    tracing::debug!(dir = %dir.display(), prefix, files = files.len(), "scanning output files");
    check_files(client_id, &files)
}
