use crate::config::WriterConfig;
use crate::connection::{ConnectionManager, ConnectionState, StateCell};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::queue::RecordQueue;
use crate::record::LogRecord;
use crate::sink::LogSink;
use crate::writer::{BackgroundWriter, Command, FlushReport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

struct Worker {
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
    conn_state: StateCell,
}

/// Process-wide handle over the queue and the background writer.
///
/// Producers call [`enqueue`](LogPipeline::enqueue) from any thread; one
/// spawned writer task drains the queue and pushes batches into the sink.
/// Lifecycle is explicit: [`start`](LogPipeline::start) and
/// [`stop`](LogPipeline::stop) are idempotent, and
/// [`flush_now`](LogPipeline::flush_now) gives tests and explicit
/// durability points a synchronous barrier.
pub struct LogPipeline {
    sink: Arc<dyn LogSink>,
    config: WriterConfig,
    queue: Arc<RecordQueue>,
    metrics: Arc<PipelineMetrics>,
    worker: Mutex<Option<Worker>>,
}

impl LogPipeline {
    /// Build a pipeline around a sink. Nothing runs until [`start`].
    ///
    /// [`start`]: LogPipeline::start
    pub fn new(sink: Arc<dyn LogSink>, config: WriterConfig) -> Self {
        let config = config.sanitized();
        let metrics = Arc::new(PipelineMetrics::new());
        let queue = Arc::new(RecordQueue::new(
            config.queue_capacity,
            config.drop_policy,
            config.batch_size,
            Arc::clone(&metrics),
        ));
        LogPipeline {
            sink,
            config,
            queue,
            metrics,
            worker: Mutex::new(None),
        }
    }

    /// Spawn the background writer. Calling it on a running pipeline is a
    /// no-op. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return;
        }

        let conn = ConnectionManager::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.metrics),
            self.config.initial_backoff,
            self.config.max_backoff,
        );
        let conn_state = conn.state_cell();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = watch::channel(false);
        let writer = BackgroundWriter::new(
            Arc::clone(&self.queue),
            conn,
            self.config.clone(),
            Arc::clone(&self.metrics),
            cmd_rx,
            stop_rx,
        );

        *worker = Some(Worker {
            commands: cmd_tx,
            shutdown: stop_tx,
            handle: tokio::spawn(writer.run()),
            conn_state,
        });
    }

    /// Buffer a record for asynchronous persistence.
    ///
    /// Never blocks and never errors; a full queue resolves via the
    /// configured drop policy. Returns `false` when the record was dropped.
    pub fn enqueue(&self, record: LogRecord) -> bool {
        self.queue.enqueue(record)
    }

    /// Signal shutdown and wait for the writer to drain, up to `timeout`.
    ///
    /// The writer performs one final drain-and-write bounded by the
    /// configured shutdown timeout; records it cannot deliver are dropped
    /// and counted. Calling `stop` on a stopped pipeline is a no-op.
    pub async fn stop(&self, timeout: Duration) {
        let worker = self.worker.lock().unwrap().take();
        let Some(worker) = worker else { return };

        let _ = worker.shutdown.send(true);
        let mut handle = worker.handle;
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            handle.abort();
            let leftover = self.queue.drain(usize::MAX).len() as u64;
            if leftover > 0 {
                self.metrics
                    .records_failed
                    .fetch_add(leftover, std::sync::atomic::Ordering::Relaxed);
            }
            warn!(leftover, "log writer did not stop in time, abandoning it");
        }
    }

    /// Block until every record enqueued before this call has been handed
    /// to the sink at least once.
    ///
    /// Returns a partial-completion report rather than an error. Must not be
    /// called from the writer's own task (it would deadlock); it is a
    /// caller-facing operation only. On a stopped pipeline every queued
    /// record is reported as failed, since nothing will consume it.
    pub async fn flush_now(&self) -> FlushReport {
        let commands = {
            let worker = self.worker.lock().unwrap();
            match worker.as_ref() {
                Some(w) => w.commands.clone(),
                None => {
                    return FlushReport {
                        written: 0,
                        failed: self.queue.len(),
                    }
                }
            }
        };

        let (tx, rx) = oneshot::channel();
        if commands.send(Command::Flush(tx)).await.is_err() {
            return FlushReport {
                written: 0,
                failed: self.queue.len(),
            };
        }
        rx.await.unwrap_or(FlushReport {
            written: 0,
            failed: 0,
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().unwrap().is_some()
    }

    /// Records currently buffered and not yet drained.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Sink connection health as last observed by the writer.
    /// [`ConnectionState::Disconnected`] before the first write.
    pub fn connection_state(&self) -> ConnectionState {
        let worker = self.worker.lock().unwrap();
        match worker.as_ref() {
            Some(w) => w.conn_state.get(),
            None => ConnectionState::Disconnected,
        }
    }
}
