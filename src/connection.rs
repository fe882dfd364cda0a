use crate::metrics::PipelineMetrics;
use crate::record::LogRecord;
use crate::sink::LogSink;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Health of the sink connection as last observed by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Failed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Shared, lock-free view of the connection state for metrics readers.
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state.as_u8(), Ordering::Relaxed);
    }
}

/// Outcome of handing a batch to the sink, as seen by the writer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    Written,
    Retryable,
    Fatal,
}

/// Owns the sink connection on behalf of the single writer task.
///
/// Only the writer calls into it, so the only shared state is the
/// [`StateCell`] read by observers. Reconnection backs off exponentially
/// from `initial_backoff` to `max_backoff` and resets after any success, so
/// a down store is probed at a bounded rate instead of in a tight loop.
pub(crate) struct ConnectionManager {
    sink: Arc<dyn LogSink>,
    state: StateCell,
    metrics: Arc<PipelineMetrics>,
    initial_backoff: Duration,
    max_backoff: Duration,
    current_backoff: Duration,
}

impl ConnectionManager {
    pub(crate) fn new(
        sink: Arc<dyn LogSink>,
        metrics: Arc<PipelineMetrics>,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        ConnectionManager {
            sink,
            state: StateCell::default(),
            metrics,
            initial_backoff,
            max_backoff,
            current_backoff: initial_backoff,
        }
    }

    /// Observer handle for the connection state.
    pub(crate) fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    /// Wait out the current backoff, then make one reconnect attempt.
    ///
    /// Returns `false` without attempting anything if the shutdown signal
    /// fires during the backoff sleep; the caller owns the pending batch and
    /// decides what happens to it.
    pub(crate) async fn ensure_connected(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if !self.backoff_sleep(shutdown).await {
            return false;
        }

        self.state.set(ConnectionState::Connecting);
        self.metrics.reconnect_attempts.fetch_add(1, Ordering::Relaxed);

        match self.sink.connect().await {
            Ok(()) => {
                debug!("log sink connection reestablished");
                self.state.set(ConnectionState::Connected);
                self.metrics.reconnect_successes.fetch_add(1, Ordering::Relaxed);
                self.current_backoff = self.initial_backoff;
                true
            }
            Err(e) => {
                warn!(error = %e, backoff = ?self.current_backoff, "log sink reconnect failed");
                self.state.set(ConnectionState::Failed);
                self.current_backoff = (self.current_backoff * 2).min(self.max_backoff);
                true
            }
        }
    }

    /// Hand a batch to the sink and classify the result.
    pub(crate) async fn write(&mut self, batch: &[LogRecord]) -> WriteOutcome {
        match self.sink.write(batch).await {
            Ok(()) => {
                self.state.set(ConnectionState::Connected);
                self.current_backoff = self.initial_backoff;
                WriteOutcome::Written
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, batch_len = batch.len(), "log batch write failed, will retry");
                self.state.set(ConnectionState::Disconnected);
                WriteOutcome::Retryable
            }
            Err(e) => {
                warn!(error = %e, batch_len = batch.len(), "log batch rejected by sink");
                self.state.set(ConnectionState::Failed);
                WriteOutcome::Fatal
            }
        }
    }

    async fn backoff_sleep(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            // Shutdown already requested: skip the wait but still allow the
            // final drain to attempt a reconnect.
            return true;
        }
        tokio::select! {
            _ = sleep(self.current_backoff) => true,
            _ = shutdown.changed() => false,
        }
    }
}
