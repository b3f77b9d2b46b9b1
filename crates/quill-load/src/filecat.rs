//! Replays a file's lines as log messages.

use std::path::Path;

use quill_core::LogEntry;
use quill_transport::Connector;
use tokio::time::Instant;

use crate::error::{LoadError, Result};
use crate::pacing::Pacer;
use crate::report::SendReport;
use crate::session;

/// Sends every line of `path` to `category`, `batch_size` lines per call,
/// paced to `rate` messages per second.
///
/// Lines are sent verbatim, trailing newline included; a last line without
/// one is sent as-is. Messages carry no client or sequence encoding, so the
/// output cannot be checked with the delivery verifier.
///
/// # Errors
/// Returns an error if the file cannot be read, the parameters are invalid,
/// or the session cannot be opened.
pub async fn file_cat(
    connector: &dyn Connector,
    path: &Path,
    category: &str,
    rate: u64,
    batch_size: usize,
) -> Result<SendReport> {
    if category.is_empty() {
        return Err(LoadError::invalid("category cannot be empty"));
    }
    if rate == 0 || batch_size == 0 {
        return Err(LoadError::invalid("rate and batch size must be positive"));
    }

    let contents = tokio::fs::read(path).await.inspect_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "could not read input file");
    })?;
    tracing::info!(
        path = %path.display(),
        category,
        rate,
        batch_size,
        bytes = contents.len(),
        "starting file cat"
    );

    let mut sink = session::open(connector, 0).await?;
    let start = Instant::now();
    let mut pacer = Pacer::for_rate(rate as f64, batch_size);
    let mut report = SendReport::default();
    let mut batch = Vec::with_capacity(batch_size);

    for line in contents.split_inclusive(|&b| b == b'\n') {
        batch.push(LogEntry::new(category, line));
        if batch.len() >= batch_size {
            session::flush(sink.as_mut(), &mut batch, &mut report).await;
            pacer.pace().await;
        }
    }
    session::flush(sink.as_mut(), &mut batch, &mut report).await;
    session::close(sink, 0).await;

    report.elapsed = start.elapsed();
    tracing::info!(category, sent = report.attempted, "file cat completed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_transport::MemoryConnector;
    use std::io::Write;

    fn input(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents).expect("write");
        file
    }

    #[tokio::test]
    async fn test_lines_sent_verbatim() {
        let file = input(b"first line\nsecond\x00line\n\nlast without newline");
        let connector = MemoryConnector::new();
        let report = file_cat(&connector, file.path(), "filecattest", 1_000_000, 2)
            .await
            .expect("run");

        assert_eq!(report.attempted, 4);
        assert_eq!(report.batches, 2);
        let messages: Vec<Vec<u8>> = connector
            .entries()
            .iter()
            .map(|e| e.message().to_vec())
            .collect();
        assert_eq!(
            messages,
            vec![
                b"first line\n".to_vec(),
                b"second\x00line\n".to_vec(),
                b"\n".to_vec(),
                b"last without newline".to_vec(),
            ]
        );
        assert!(connector.entries().iter().all(|e| e.category() == "filecattest"));
    }

    #[tokio::test]
    async fn test_empty_file_sends_nothing() {
        let file = input(b"");
        let connector = MemoryConnector::new();
        let report = file_cat(&connector, file.path(), "filecattest", 1000, 20)
            .await
            .expect("run");
        assert_eq!(report.attempted, 0);
        assert_eq!(report.batches, 0);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let connector = MemoryConnector::new();
        let err = file_cat(&connector, &dir.path().join("absent"), "filecattest", 1000, 20)
            .await
            .expect_err("missing file");
        assert!(matches!(err, LoadError::Io(_)));
        assert_eq!(connector.sessions(), 0);
    }
}
