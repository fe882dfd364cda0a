use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters emitted by the pipeline for the observability collaborator.
///
/// Everything is a monotonically increasing counter updated with relaxed
/// ordering; readers take a [`snapshot`](PipelineMetrics::snapshot) and do
/// not need any synchronization with the writer.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Records accepted into the queue.
    pub records_enqueued: AtomicU64,
    /// Records discarded at the queue by the drop policy.
    pub records_dropped_queue: AtomicU64,
    /// Records confirmed written by the sink.
    pub records_written: AtomicU64,
    /// Records lost after retry exhaustion, fatal failures or shutdown.
    pub records_failed: AtomicU64,
    /// Batches confirmed written by the sink.
    pub batches_written: AtomicU64,
    /// Batches discarded after exhausting retries or on fatal failure.
    pub batches_dropped: AtomicU64,
    /// Reconnection attempts made by the connection manager.
    pub reconnect_attempts: AtomicU64,
    /// Reconnection attempts that succeeded.
    pub reconnect_successes: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_dropped_queue: self.records_dropped_queue.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            reconnect_successes: self.reconnect_successes.load(Ordering::Relaxed),
        }
    }

}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_enqueued: u64,
    pub records_dropped_queue: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub batches_written: u64,
    pub batches_dropped: u64,
    pub reconnect_attempts: u64,
    pub reconnect_successes: u64,
}
