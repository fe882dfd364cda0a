//! End-to-end behavior of the logging pipeline through its public API.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use db_log_pipeline::config::{LogConfig, WriterConfig};
use db_log_pipeline::manager::LogManager;
use db_log_pipeline::memory_sink::MemorySink;
use db_log_pipeline::pipeline::LogPipeline;
use db_log_pipeline::queue::DropPolicy;
use db_log_pipeline::record::{Level, LogRecord};
use db_log_pipeline::sink::{LogSink, SinkError};

fn record(n: usize) -> LogRecord {
    LogRecord::new(Level::Info, "it", format!("m{n}"))
}

fn base_config() -> WriterConfig {
    WriterConfig {
        batch_size: 10,
        flush_interval: Duration::from_millis(50),
        queue_capacity: 100,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(8),
        shutdown_timeout: Duration::from_secs(1),
        ..WriterConfig::default()
    }
}

/// Fails the first `failures` writes with a retryable error, then relays to
/// an inner memory sink.
struct FlakySink {
    failures: AtomicUsize,
    inner: MemorySink,
}

impl FlakySink {
    fn failing(n: usize) -> Self {
        FlakySink {
            failures: AtomicUsize::new(n),
            inner: MemorySink::new(),
        }
    }
}

#[async_trait]
impl LogSink for FlakySink {
    async fn write(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(SinkError::Connection("transient outage".into()));
        }
        self.inner.write(batch).await
    }
}

#[tokio::test]
async fn records_below_batch_size_are_flushed_by_the_interval() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = LogPipeline::new(sink.clone(), base_config());
    pipeline.start();

    for i in 0..3 {
        pipeline.enqueue(record(i));
    }

    // Well past the 50ms flush interval, with scheduling slack.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(sink.len(), 3);

    pipeline.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn bounded_loss_when_nothing_consumes() {
    // Writer never started: the queue alone decides who survives.
    let config = WriterConfig {
        queue_capacity: 20,
        drop_policy: DropPolicy::DropNew,
        ..base_config()
    };
    let sink = Arc::new(MemorySink::new());
    let pipeline = LogPipeline::new(sink.clone(), config);

    for i in 0..100 {
        pipeline.enqueue(record(i));
    }

    let snap = pipeline.metrics();
    assert_eq!(snap.records_dropped_queue, 80);
    assert_eq!(pipeline.queued(), 20);

    // The 20 oldest survive under drop-new.
    pipeline.start();
    pipeline.flush_now().await;
    let messages: Vec<_> = sink.records().iter().map(|r| r.message.clone()).collect();
    let expected: Vec<_> = (0..20).map(|i| format!("m{i}")).collect();
    assert_eq!(messages, expected);

    pipeline.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn drop_old_keeps_the_newest_records() {
    let config = WriterConfig {
        queue_capacity: 20,
        drop_policy: DropPolicy::DropOld,
        ..base_config()
    };
    let sink = Arc::new(MemorySink::new());
    let pipeline = LogPipeline::new(sink.clone(), config);

    for i in 0..100 {
        pipeline.enqueue(record(i));
    }
    assert_eq!(pipeline.metrics().records_dropped_queue, 80);

    pipeline.start();
    pipeline.flush_now().await;
    let messages: Vec<_> = sink.records().iter().map(|r| r.message.clone()).collect();
    let expected: Vec<_> = (80..100).map(|i| format!("m{i}")).collect();
    assert_eq!(messages, expected);

    pipeline.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn graceful_shutdown_delivers_everything_queued() {
    // 50 records, batch size 100, a flush interval that will never fire,
    // and a 5s stop budget: only the shutdown drain can deliver them.
    let config = WriterConfig {
        batch_size: 100,
        flush_interval: Duration::from_secs(60),
        queue_capacity: 1000,
        ..base_config()
    };
    let sink = Arc::new(MemorySink::new());
    let pipeline = LogPipeline::new(sink.clone(), config);
    pipeline.start();

    for i in 0..50 {
        assert!(pipeline.enqueue(record(i)));
    }
    pipeline.stop(Duration::from_secs(5)).await;

    assert_eq!(sink.len(), 50);
    let snap = pipeline.metrics();
    assert_eq!(snap.records_written, 50);
    assert_eq!(snap.batches_dropped, 0);
}

#[tokio::test]
async fn transient_outage_recovers_without_losing_the_batch() {
    let sink = Arc::new(FlakySink::failing(1));
    let config = WriterConfig {
        flush_interval: Duration::from_secs(60),
        ..base_config()
    };
    let pipeline = LogPipeline::new(sink.clone(), config);
    pipeline.start();

    for i in 0..10 {
        pipeline.enqueue(record(i));
    }
    pipeline.flush_now().await;

    assert_eq!(sink.inner.len(), 10);
    let snap = pipeline.metrics();
    assert_eq!(snap.batches_written, 1);
    assert_eq!(snap.batches_dropped, 0);
    assert!(snap.reconnect_attempts >= 1);

    pipeline.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn sustained_outage_drops_batches_but_never_blocks_producers() {
    struct DownSink;

    #[async_trait]
    impl LogSink for DownSink {
        async fn connect(&self) -> Result<(), SinkError> {
            Err(SinkError::Connection("still down".into()))
        }
        async fn write(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
            Err(SinkError::Connection("still down".into()))
        }
    }

    let pipeline = LogPipeline::new(Arc::new(DownSink), base_config());
    pipeline.start();

    let started = std::time::Instant::now();
    for i in 0..30 {
        pipeline.enqueue(record(i));
    }
    // Enqueueing against a dead store is still instantaneous.
    assert!(started.elapsed() < Duration::from_secs(1));

    pipeline.flush_now().await;
    let snap = pipeline.metrics();
    assert!(snap.batches_dropped >= 1);
    assert_eq!(snap.records_written, 0);

    pipeline.stop(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn flush_now_is_a_synchronous_barrier() {
    let sink = Arc::new(MemorySink::new());
    let config = WriterConfig {
        flush_interval: Duration::from_secs(60),
        ..base_config()
    };
    let pipeline = LogPipeline::new(sink.clone(), config);
    pipeline.start();

    for round in 0..5 {
        pipeline.enqueue(record(round));
        pipeline.flush_now().await;
        assert_eq!(sink.len(), round + 1);
    }

    pipeline.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn manager_end_to_end_with_masking_and_metrics() {
    let sink = Arc::new(MemorySink::new());
    let config = LogConfig {
        name: "svc".into(),
        level: Level::Info,
        console_output: false,
        writer: WriterConfig {
            flush_interval: Duration::from_secs(60),
            ..base_config()
        },
        ..LogConfig::default()
    };

    let manager = LogManager::with_sink(config, sink.clone());
    manager.start();

    let logger = manager.logger(Some("auth"));
    logger.debug("filtered out by level");
    logger.error("login rejected: password=hunter2");
    manager.flush_now().await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].logger_name, "svc.auth");
    assert_eq!(records[0].message, "login rejected: password=***MASKED***");

    let snap = manager.metrics().unwrap();
    assert_eq!(snap.records_enqueued, 1);
    assert_eq!(snap.records_written, 1);

    manager.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn producers_on_many_threads_are_all_drained() {
    let sink = Arc::new(MemorySink::new());
    let config = WriterConfig {
        queue_capacity: 10_000,
        batch_size: 50,
        ..base_config()
    };
    let pipeline = Arc::new(LogPipeline::new(sink.clone(), config));
    pipeline.start();

    let mut handles = Vec::new();
    for t in 0..4 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(std::thread::spawn(move || {
            for i in 0..250 {
                pipeline.enqueue(record(t * 1000 + i));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    pipeline.flush_now().await;
    assert_eq!(sink.len(), 1000);
    assert!(sink.batches().iter().all(|b| b.len() <= 50));

    pipeline.stop(Duration::from_secs(1)).await;
}
