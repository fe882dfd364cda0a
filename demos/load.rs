use std::sync::Arc;
use std::time::{Duration, Instant};

use db_log_pipeline::config::{LogConfig, WriterConfig};
use db_log_pipeline::manager::LogManager;
use db_log_pipeline::noop_sink::NoopSink;

/// Measures enqueue overhead with persistence stubbed out.
#[tokio::main]
async fn main() {
    let config = LogConfig {
        console_output: false,
        writer: WriterConfig {
            queue_capacity: 10_000,
            ..WriterConfig::default()
        },
        ..LogConfig::default()
    };

    let manager = LogManager::with_sink(config, Arc::new(NoopSink));
    manager.start();
    let logger = manager.logger(Some("load"));

    let n: u64 = 100_000;
    let start = Instant::now();
    for i in 0..n {
        logger.error(format!("load test error {i}"));
    }
    let elapsed = start.elapsed();

    println!(
        "sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    println!("metrics: {:?}", manager.metrics());

    manager.stop(Duration::from_secs(5)).await;
}
