use crate::config::LogConfig;
use crate::manager::LogManager;
use crate::sink::LogSink;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber for the pipeline's own diagnostics.
///
/// The writer reports reconnects and dropped batches through `tracing`
/// rather than through itself; without a subscriber those messages go
/// nowhere. The filter honors `RUST_LOG` and defaults to `info` with noisy
/// dependency crates quieted. Safe to call more than once; only the first
/// call installs anything.
pub fn init_diagnostics() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,tower=warn"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Build a [`LogManager`] over `sink` with the provided configuration and
/// start its background writer.
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive batches of
///   records.
/// - `config`: [`LogConfig`] controlling levels, console rendering,
///   masking and the writer's batching behavior.
///
/// **Returns**
/// - A started manager; call [`LogManager::stop`] during application
///   shutdown to drain whatever is still queued.
///
/// Must be called from within a tokio runtime, since it spawns the writer
/// task.
pub fn init_pipeline_with_config(sink: Arc<dyn LogSink>, config: LogConfig) -> Arc<LogManager> {
    let manager = Arc::new(LogManager::with_sink(config, sink));
    manager.start();
    manager
}

/// Initialize with sensible defaults.
///
/// Equivalent to calling [`init_pipeline_with_config`] with
/// [`LogConfig::default`]. This is the recommended entrypoint for typical
/// services.
pub fn init_pipeline(sink: Arc<dyn LogSink>) -> Arc<LogManager> {
    init_pipeline_with_config(sink, LogConfig::default())
}

/// Initialize from `LOG_*` environment variables; see
/// [`LogConfig::from_env`] for the recognized names.
pub fn init_pipeline_from_env(sink: Arc<dyn LogSink>) -> Arc<LogManager> {
    init_pipeline_with_config(sink, LogConfig::from_env())
}
