use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use std::sync::Mutex;

/// In-memory sink that keeps every batch it receives.
///
/// Intended for tests and local experimentation: assertions can inspect the
/// exact batch boundaries the writer produced, not just the record stream.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All batches received so far, in write order.
    pub fn batches(&self) -> Vec<Vec<LogRecord>> {
        self.batches.lock().unwrap().clone()
    }

    /// All records received so far, flattened in write order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    /// Total number of records received.
    pub fn len(&self) -> usize {
        self.batches.lock().unwrap().iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}
