use crate::metrics::PipelineMetrics;
use crate::record::LogRecord;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// What to do with a record arriving at a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Reject the incoming record; the buffered ones survive.
    DropNew,
    /// Evict the oldest buffered record to make room for the incoming one.
    #[default]
    DropOld,
}

/// Bounded buffer between the many producing threads and the single
/// background writer.
///
/// `enqueue` is synchronous and callable from any thread: under backpressure
/// it resolves via the configured [`DropPolicy`] instead of blocking or
/// erroring. The writer side waits on [`batch_ready`](RecordQueue::batch_ready)
/// and drains in FIFO order.
pub struct RecordQueue {
    buffer: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
    policy: DropPolicy,
    batch_size: usize,
    metrics: Arc<PipelineMetrics>,
    ready: Notify,
}

impl RecordQueue {
    pub fn new(
        capacity: usize,
        policy: DropPolicy,
        batch_size: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        RecordQueue {
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            policy,
            batch_size,
            metrics,
            ready: Notify::new(),
        }
    }

    /// Buffer a record for the background writer.
    ///
    /// Returns `false` when the record was discarded by the drop policy.
    /// Never blocks the caller beyond the short mutex hold and never
    /// propagates an error: persistence failures are invisible to emitters.
    pub fn enqueue(&self, record: LogRecord) -> bool {
        let notify;
        {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.len() >= self.capacity {
                match self.policy {
                    DropPolicy::DropNew => {
                        self.metrics.records_dropped_queue.fetch_add(1, Ordering::Relaxed);
                        return false;
                    }
                    DropPolicy::DropOld => {
                        buffer.pop_front();
                        self.metrics.records_dropped_queue.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            buffer.push_back(record);
            notify = buffer.len() >= self.batch_size;
        }

        self.metrics.records_enqueued.fetch_add(1, Ordering::Relaxed);
        if notify {
            self.ready.notify_one();
        }
        true
    }

    /// Remove and return up to `max` records in enqueue order.
    pub fn drain(&self, max: usize) -> Vec<LogRecord> {
        let mut buffer = self.buffer.lock().unwrap();
        let take = max.min(buffer.len());
        buffer.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().unwrap().is_empty()
    }

    /// Resolve once a full batch has accumulated since the last wakeup.
    pub(crate) async fn batch_ready(&self) {
        self.ready.notified().await;
    }
}
