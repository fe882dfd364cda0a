use crate::filter::SensitiveDataFilter;
use crate::format;
use crate::pipeline::LogPipeline;
use crate::record::{Environment, Level, LogRecord};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a logger renders records to stdout, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleMode {
    Off,
    /// Colored, human-oriented lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Leveled logging facade handed out by
/// [`LogManager`](crate::manager::LogManager).
///
/// Each call below the configured threshold is discarded before a record is
/// even built. Everything else is tagged with the environment, passed
/// through the sensitive-data filter, optionally rendered to stdout, and
/// enqueued on the shared pipeline. Emitting is synchronous and cheap; no
/// call here ever blocks on or errors because of the store.
pub struct Logger {
    name: String,
    level: Level,
    environment: Environment,
    console: ConsoleMode,
    filter: Option<Arc<SensitiveDataFilter>>,
    pipeline: Option<Arc<LogPipeline>>,
}

impl Logger {
    pub(crate) fn new(
        name: String,
        level: Level,
        environment: Environment,
        console: ConsoleMode,
        filter: Option<Arc<SensitiveDataFilter>>,
        pipeline: Option<Arc<LogPipeline>>,
    ) -> Self {
        Logger {
            name,
            level,
            environment,
            console,
            filter,
            pipeline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when a record at `level` would be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, message);
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        if !self.enabled(level) {
            return;
        }
        self.emit(LogRecord::new(level, self.name.clone(), message));
    }

    /// Log with caller-supplied context fields.
    pub fn log_with(
        &self,
        level: Level,
        message: impl Into<String>,
        extra_fields: BTreeMap<String, serde_json::Value>,
    ) {
        if !self.enabled(level) {
            return;
        }
        let mut record = LogRecord::new(level, self.name.clone(), message);
        record.extra_fields = extra_fields;
        self.emit(record);
    }

    /// Log an error value, capturing its source chain as exception text.
    pub fn log_error(
        &self,
        level: Level,
        message: impl Into<String>,
        error: &(dyn std::error::Error + 'static),
    ) {
        if !self.enabled(level) {
            return;
        }
        let record = LogRecord::new(level, self.name.clone(), message)
            .with_exception(render_error_chain(error));
        self.emit(record);
    }

    /// Hand a fully-built record to the logger's filters and pipeline.
    pub fn emit(&self, mut record: LogRecord) {
        record.environment = self.environment;
        if let Some(filter) = &self.filter {
            filter.apply(&mut record);
        }

        match self.console {
            ConsoleMode::Off => {}
            ConsoleMode::Pretty => println!("{}", format::format_console(&record)),
            ConsoleMode::Json => println!("{}", format::format_json(&record)),
        }

        if let Some(pipeline) = &self.pipeline {
            pipeline.enqueue(record);
        }
    }
}

fn render_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
