use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;

/// A sink that simply drops all batches.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// external I/O, and for unit tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn write(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
        Ok(())
    }
}
