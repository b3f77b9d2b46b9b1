//! Shared send/close steps for every generator.

use quill_core::LogEntry;
use quill_transport::{Connector, LogSink, log_or_warn};

use crate::error::{LoadError, Result};
use crate::report::SendReport;

/// Opens session `index`, mapping failure to [`LoadError::Session`].
pub(crate) async fn open(connector: &dyn Connector, index: usize) -> Result<Box<dyn LogSink>> {
    connector.connect().await.map_err(|source| {
        tracing::error!(
            target_endpoint = %connector.describe(),
            index,
            error = %source,
            "could not open session"
        );
        LoadError::Session { index, source }
    })
}

/// Sends and drains `batch`, recording the outcome.
pub(crate) async fn flush(
    sink: &mut dyn LogSink,
    batch: &mut Vec<LogEntry>,
    report: &mut SendReport,
) {
    if batch.is_empty() {
        return;
    }
    let ok = log_or_warn(sink, batch).await;
    report.record(batch.len(), ok);
    batch.clear();
}

/// Closes a session. Failures are logged and otherwise ignored.
pub(crate) async fn close(mut sink: Box<dyn LogSink>, index: usize) {
    if let Err(e) = sink.close().await {
        tracing::warn!(index, error = %e, "error closing session");
    }
}
