use crate::config::LogConfig;
use crate::filter::SensitiveDataFilter;
use crate::logger::{ConsoleMode, Logger};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::LogPipeline;
use crate::record::Environment;
use crate::sink::LogSink;
use crate::writer::FlushReport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Owns one pipeline and hands out configured [`Logger`]s.
///
/// Loggers are cached per name, so `logger(Some("db"))` returns the same
/// instance for the lifetime of the manager. The manager can also run
/// without a sink, in which case loggers only render to the console.
pub struct LogManager {
    config: LogConfig,
    pipeline: Option<Arc<LogPipeline>>,
    filter: Option<Arc<SensitiveDataFilter>>,
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

impl LogManager {
    /// Console-only manager: records are rendered but never persisted.
    pub fn new(config: LogConfig) -> Self {
        Self::build(config, None)
    }

    /// Manager with a persistence pipeline over `sink`.
    pub fn with_sink(config: LogConfig, sink: Arc<dyn LogSink>) -> Self {
        let pipeline = Arc::new(LogPipeline::new(sink, config.writer.clone()));
        Self::build(config, Some(pipeline))
    }

    fn build(config: LogConfig, pipeline: Option<Arc<LogPipeline>>) -> Self {
        let filter = config
            .mask_sensitive
            .then(|| Arc::new(SensitiveDataFilter::default()));
        LogManager {
            config,
            pipeline,
            filter,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    /// Start the background writer. Idempotent; a no-op for console-only
    /// managers.
    pub fn start(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.start();
        }
    }

    /// Drain and stop the background writer. Idempotent.
    pub async fn stop(&self, timeout: Duration) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.stop(timeout).await;
        }
    }

    /// Synchronous flush barrier; see
    /// [`LogPipeline::flush_now`](crate::pipeline::LogPipeline::flush_now).
    pub async fn flush_now(&self) -> FlushReport {
        match &self.pipeline {
            Some(pipeline) => pipeline.flush_now().await,
            None => FlushReport::default(),
        }
    }

    /// Get (or create) the logger for a component.
    ///
    /// `None` returns the root logger named after the config; `Some("db")`
    /// returns `"{name}.db"`.
    pub fn logger(&self, name: Option<&str>) -> Arc<Logger> {
        let full_name = match name {
            Some(name) => format!("{}.{}", self.config.name, name),
            None => self.config.name.clone(),
        };

        let mut loggers = self.loggers.lock().unwrap();
        Arc::clone(loggers.entry(full_name.clone()).or_insert_with(|| {
            let console = if !self.config.console_output {
                ConsoleMode::Off
            } else if self.config.json_console {
                ConsoleMode::Json
            } else {
                ConsoleMode::Pretty
            };
            Arc::new(Logger::new(
                full_name,
                self.config.level,
                self.config.environment,
                console,
                self.filter.clone(),
                self.pipeline.clone(),
            ))
        }))
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.pipeline.as_ref().map(|p| p.metrics())
    }

    pub fn pipeline(&self) -> Option<&Arc<LogPipeline>> {
        self.pipeline.as_ref()
    }
}

/// Explicit registry of managers keyed by (name, environment).
///
/// The registry replaces the usual global singleton: construct one at
/// process start, pass it by reference, and tear it down at process end.
/// Two components asking for the same (name, environment) share a manager
/// and therefore a pipeline.
#[derive(Default)]
pub struct LogRegistry {
    managers: Mutex<HashMap<(String, Environment), Arc<LogManager>>>,
}

impl LogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the manager for (config.name, config.environment), building
    /// it with `make` on first use.
    pub fn get_or_create(
        &self,
        config: LogConfig,
        make: impl FnOnce(LogConfig) -> LogManager,
    ) -> Arc<LogManager> {
        let key = (config.name.clone(), config.environment);
        let mut managers = self.managers.lock().unwrap();
        Arc::clone(
            managers
                .entry(key)
                .or_insert_with(|| Arc::new(make(config))),
        )
    }

    pub fn get(&self, name: &str, environment: Environment) -> Option<Arc<LogManager>> {
        self.managers
            .lock()
            .unwrap()
            .get(&(name.to_string(), environment))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.managers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.lock().unwrap().is_empty()
    }

    /// Stop every registered manager, draining each within `timeout`.
    pub async fn shutdown_all(&self, timeout: Duration) {
        let managers: Vec<_> = self.managers.lock().unwrap().values().cloned().collect();
        for manager in managers {
            manager.stop(timeout).await;
        }
    }

    /// Forget every manager without stopping them. Mainly for tests.
    pub fn clear(&self) {
        self.managers.lock().unwrap().clear();
    }
}
