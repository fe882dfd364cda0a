use crate::record::LogRecord;
use async_trait::async_trait;

/// Failure reported by a [`LogSink`].
///
/// The writer only cares about one distinction: retryable failures trigger a
/// reconnect-and-retry cycle, fatal ones drop the batch immediately without
/// burning the retry budget.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// The backend could not be reached or the connection was lost.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend rejected the batch (malformed data, constraint
    /// violation). Retrying the same batch cannot succeed.
    #[error("batch rejected: {0}")]
    Rejected(String),

    /// Authentication or authorization failed.
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Connection(_) | SinkError::Timeout(_))
    }
}

/// Destination for batches of [`LogRecord`]s drained by the background
/// writer.
///
/// Implementations are responsible for transporting records to a concrete
/// store (Postgres, stdout, memory, etc). The writer calls `write` from its
/// own task and never from application threads.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Verify the backend connection, reestablishing it if necessary.
    ///
    /// Called by the connection manager before retrying a failed batch.
    /// Sinks with no connection state can rely on the default no-op.
    async fn connect(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Persist an ordered batch of records.
    ///
    /// **Parameters**
    /// - `batch`: records in enqueue order, never longer than the configured
    ///   batch size.
    ///
    /// **Returns**
    /// - `Ok(())` if the whole batch was accepted by the backend.
    /// - `Err(..)` if the batch failed as a unit. Partial writes must not be
    ///   left behind; the writer may hand the same batch back on retry.
    async fn write(&self, batch: &[LogRecord]) -> Result<(), SinkError>;
}
