use crate::config::WriterConfig;
use crate::connection::{ConnectionManager, WriteOutcome};
use crate::metrics::PipelineMetrics;
use crate::queue::RecordQueue;
use crate::record::LogRecord;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Control messages accepted by the background writer.
pub(crate) enum Command {
    Flush(oneshot::Sender<FlushReport>),
}

/// Partial-completion report returned by a flush.
///
/// A flush never fails outright: records that could not be confirmed written
/// (retry exhaustion, fatal sink errors, shutdown racing the flush) are
/// counted in `failed` instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records handed to the sink and confirmed written.
    pub written: usize,
    /// Records that could not be confirmed written.
    pub failed: usize,
}

enum BatchOutcome {
    Written(usize),
    Dropped(usize),
    /// Shutdown fired during a reconnect backoff; the batch stays parked in
    /// `pending` for the final drain.
    Interrupted,
}

/// The single consumer of the record queue.
///
/// Runs as one spawned task for the whole pipeline lifetime. Wakes when a
/// full batch accumulates, when the flush interval elapses, on a control
/// command, or on shutdown. Batches are written strictly in FIFO order; a
/// failed batch is retried in place and later batches wait.
pub(crate) struct BackgroundWriter {
    queue: Arc<RecordQueue>,
    conn: ConnectionManager,
    config: WriterConfig,
    metrics: Arc<PipelineMetrics>,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
    /// Batch currently being written. Records live here from drain until the
    /// sink confirms them, so nothing is lost if the task is torn down
    /// mid-retry.
    pending: Vec<LogRecord>,
}

impl BackgroundWriter {
    pub(crate) fn new(
        queue: Arc<RecordQueue>,
        conn: ConnectionManager,
        config: WriterConfig,
        metrics: Arc<PipelineMetrics>,
        commands: mpsc::Receiver<Command>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        BackgroundWriter {
            queue,
            conn,
            config,
            metrics,
            commands,
            shutdown,
            pending: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            "background log writer started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Flush(ack)) => {
                        let report = self.flush_queued().await;
                        let _ = ack.send(report);
                        if !self.pending.is_empty() {
                            break;
                        }
                    }
                    // Pipeline handle dropped; treat as a stop request.
                    None => break,
                },
                _ = self.queue.batch_ready() => {
                    if !self.write_ready().await {
                        break;
                    }
                }
                _ = sleep(self.config.flush_interval) => {
                    self.flush_queued().await;
                    if !self.pending.is_empty() {
                        break;
                    }
                }
            }
        }

        self.final_drain().await;
        debug!("background log writer stopped");
    }

    /// Write full batches for as long as they are available.
    ///
    /// Returns `false` when interrupted by shutdown.
    async fn write_ready(&mut self) -> bool {
        while self.queue.len() >= self.config.batch_size {
            self.pending = self.queue.drain(self.config.batch_size);
            if matches!(self.write_pending().await, BatchOutcome::Interrupted) {
                return false;
            }
        }
        true
    }

    /// Drain everything currently queued, regardless of batch fullness.
    async fn flush_queued(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        loop {
            if self.pending.is_empty() {
                self.pending = self.queue.drain(self.config.batch_size);
            }
            if self.pending.is_empty() {
                break;
            }
            match self.write_pending().await {
                BatchOutcome::Written(n) => report.written += n,
                BatchOutcome::Dropped(n) => report.failed += n,
                BatchOutcome::Interrupted => {
                    report.failed += self.pending.len();
                    break;
                }
            }
        }
        report
    }

    /// Write the parked batch with the retry policy: up to `max_retries`
    /// attempts with the same batch, reconnecting before each retry. Fatal
    /// failures and retry exhaustion drop the batch and count the loss.
    async fn write_pending(&mut self) -> BatchOutcome {
        let len = self.pending.len();
        for attempt in 1..=self.config.max_retries {
            if attempt > 1 && !self.conn.ensure_connected(&mut self.shutdown).await {
                return BatchOutcome::Interrupted;
            }
            match self.conn.write(&self.pending).await {
                WriteOutcome::Written => {
                    self.pending.clear();
                    self.metrics.batches_written.fetch_add(1, Ordering::Relaxed);
                    self.metrics.records_written.fetch_add(len as u64, Ordering::Relaxed);
                    return BatchOutcome::Written(len);
                }
                WriteOutcome::Fatal => break,
                WriteOutcome::Retryable => {}
            }
        }

        warn!(records = len, "dropping log batch");
        self.pending.clear();
        self.metrics.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.metrics.records_failed.fetch_add(len as u64, Ordering::Relaxed);
        BatchOutcome::Dropped(len)
    }

    /// One final bounded drain on shutdown. Anything still unwritten when
    /// the bound elapses is counted as failed; shutdown never blocks
    /// indefinitely.
    async fn final_drain(&mut self) {
        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            loop {
                if self.pending.is_empty() {
                    self.pending = self.queue.drain(self.config.batch_size);
                }
                if self.pending.is_empty() {
                    break;
                }
                if matches!(self.write_pending().await, BatchOutcome::Interrupted) {
                    break;
                }
            }
        })
        .await;

        let leftover = self.pending.len() + self.queue.drain(usize::MAX).len();
        if leftover > 0 {
            self.metrics.records_failed.fetch_add(leftover as u64, Ordering::Relaxed);
            warn!(
                leftover,
                timed_out = drained.is_err(),
                "shutdown drain incomplete, dropping remaining records"
            );
        }
    }
}
