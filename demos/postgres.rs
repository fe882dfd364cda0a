use std::sync::Arc;
use std::time::Duration;

use db_log_pipeline::config::LogConfig;
use db_log_pipeline::init::{init_diagnostics, init_pipeline_with_config};
use db_log_pipeline::postgres::{PostgresConfig, PostgresSink};
use db_log_pipeline::record::Level;

/// End-to-end demo against a real Postgres instance.
///
/// Point `LOG_DB_*` variables at your database (see the expected table in
/// the `PostgresSink` docs), then:
///
///   cargo run --example postgres
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_diagnostics();

    // 1) Build the sink from LOG_DB_HOST / LOG_DB_NAME / LOG_DB_USER / ...
    let sink = Arc::new(PostgresSink::new(PostgresConfig::from_env())?);

    // 2) Build and start the manager.
    let manager = init_pipeline_with_config(sink, LogConfig::from_env());
    let logger = manager.logger(Some("demo"));

    // 3) Emit a few records; the console shows them immediately, the
    //    background writer batches them into Postgres.
    logger.info("service started");
    logger.log_with(
        Level::Error,
        "order failed",
        [("order_id".to_string(), serde_json::json!(123))].into(),
    );
    logger.warning("password=secret123 never reaches the database unmasked");

    // 4) Force a flush, then drain and stop.
    let report = manager.flush_now().await;
    println!("flushed: {report:?}");
    println!("metrics: {:?}", manager.metrics());

    manager.stop(Duration::from_secs(5)).await;
    Ok(())
}
