use crate::queue::DropPolicy;
use crate::record::{Environment, Level};
use std::time::Duration;

/// Environment variable names understood by [`WriterConfig::from_env`] and
/// [`LogConfig::from_env`].
///
/// These are purely helpers; the core types remain decoupled from
/// environment access.
pub const LOG_NAME_ENV: &str = "LOG_NAME";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const LOG_ENVIRONMENT_ENV: &str = "LOG_ENVIRONMENT";
pub const LOG_CONSOLE_ENV: &str = "LOG_CONSOLE";
pub const LOG_JSON_ENV: &str = "LOG_JSON";
pub const LOG_MASK_SENSITIVE_ENV: &str = "LOG_MASK_SENSITIVE";
pub const LOG_WRITER_BATCH_SIZE_ENV: &str = "LOG_WRITER_BATCH_SIZE";
pub const LOG_WRITER_FLUSH_INTERVAL_MS_ENV: &str = "LOG_WRITER_FLUSH_INTERVAL_MS";
pub const LOG_WRITER_QUEUE_CAPACITY_ENV: &str = "LOG_WRITER_QUEUE_CAPACITY";
pub const LOG_WRITER_MAX_RETRIES_ENV: &str = "LOG_WRITER_MAX_RETRIES";
pub const LOG_WRITER_DROP_POLICY_ENV: &str = "LOG_WRITER_DROP_POLICY";
pub const LOG_WRITER_SHUTDOWN_TIMEOUT_MS_ENV: &str = "LOG_WRITER_SHUTDOWN_TIMEOUT_MS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => default,
    }
}

/// Tuning knobs for the batching queue and background writer.
///
/// Read-only after [`LogPipeline::start`](crate::pipeline::LogPipeline::start);
/// any thread may read it without synchronization.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum records per batch handed to the sink.
    pub batch_size: usize,
    /// Maximum time a record waits in the queue before a flush is forced.
    pub flush_interval: Duration,
    /// Queue capacity; records past it resolve via `drop_policy`.
    pub queue_capacity: usize,
    /// Total write attempts per batch before it is discarded.
    pub max_retries: u32,
    /// What to do with a record arriving at a full queue.
    pub drop_policy: DropPolicy,
    /// Bound on the final drain performed during shutdown.
    pub shutdown_timeout: Duration,
    /// First reconnect backoff; doubles on each failed attempt.
    pub initial_backoff: Duration,
    /// Ceiling for the reconnect backoff.
    pub max_backoff: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            queue_capacity: 1000,
            max_retries: 3,
            drop_policy: DropPolicy::DropOld,
            shutdown_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl WriterConfig {
    /// Build a config from `LOG_WRITER_*` environment variables, falling
    /// back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = WriterConfig::default();
        WriterConfig {
            batch_size: env_parsed(LOG_WRITER_BATCH_SIZE_ENV, defaults.batch_size),
            flush_interval: Duration::from_millis(env_parsed(
                LOG_WRITER_FLUSH_INTERVAL_MS_ENV,
                defaults.flush_interval.as_millis() as u64,
            )),
            queue_capacity: env_parsed(LOG_WRITER_QUEUE_CAPACITY_ENV, defaults.queue_capacity),
            max_retries: env_parsed(LOG_WRITER_MAX_RETRIES_ENV, defaults.max_retries),
            drop_policy: match env_or(LOG_WRITER_DROP_POLICY_ENV, "drop-old").as_str() {
                "drop-new" => DropPolicy::DropNew,
                _ => DropPolicy::DropOld,
            },
            shutdown_timeout: Duration::from_millis(env_parsed(
                LOG_WRITER_SHUTDOWN_TIMEOUT_MS_ENV,
                defaults.shutdown_timeout.as_millis() as u64,
            )),
            ..defaults
        }
    }

    /// Enforce minimal thresholds to avoid degenerate configs.
    pub fn sanitized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.queue_capacity = self.queue_capacity.max(self.batch_size).max(16);
        if self.flush_interval < Duration::from_millis(10) {
            self.flush_interval = Duration::from_millis(10);
        }
        self.max_retries = self.max_retries.max(1);
        if self.initial_backoff.is_zero() {
            self.initial_backoff = Duration::from_millis(1);
        }
        if self.max_backoff < self.initial_backoff {
            self.max_backoff = self.initial_backoff;
        }
        self
    }
}

/// Application-facing logging configuration consumed by
/// [`LogManager`](crate::manager::LogManager).
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Root logger name, usually the application name.
    pub name: String,
    /// Minimum level a record must have to be emitted at all.
    pub level: Level,
    pub environment: Environment,
    /// Render records to stdout in addition to the sink.
    pub console_output: bool,
    /// Use the JSON console format instead of the colored one.
    pub json_console: bool,
    /// Mask sensitive key/value pairs before a record leaves the logger.
    pub mask_sensitive: bool,
    pub writer: WriterConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            name: "app".to_string(),
            level: Level::Info,
            environment: Environment::Development,
            console_output: true,
            json_console: false,
            mask_sensitive: true,
            writer: WriterConfig::default(),
        }
    }
}

impl LogConfig {
    /// Build a config from `LOG_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = LogConfig::default();
        LogConfig {
            name: env_or(LOG_NAME_ENV, &defaults.name),
            level: env_or(LOG_LEVEL_ENV, "INFO").parse().unwrap_or(defaults.level),
            environment: env_or(LOG_ENVIRONMENT_ENV, "development")
                .parse()
                .unwrap_or(defaults.environment),
            console_output: env_bool(LOG_CONSOLE_ENV, defaults.console_output),
            json_console: env_bool(LOG_JSON_ENV, defaults.json_console),
            mask_sensitive: env_bool(LOG_MASK_SENSITIVE_ENV, defaults.mask_sensitive),
            writer: WriterConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_defaults_match_documented_values() {
        let config = WriterConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.drop_policy, DropPolicy::DropOld);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn sanitize_clamps_degenerate_values() {
        let config = WriterConfig {
            batch_size: 0,
            queue_capacity: 1,
            flush_interval: Duration::from_millis(1),
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..WriterConfig::default()
        }
        .sanitized();

        assert_eq!(config.batch_size, 1);
        assert!(config.queue_capacity >= 16);
        assert_eq!(config.flush_interval, Duration::from_millis(10));
        assert_eq!(config.max_retries, 1);
        assert!(!config.initial_backoff.is_zero());
        assert!(config.max_backoff >= config.initial_backoff);
    }

    #[test]
    fn queue_capacity_never_below_batch_size() {
        let config = WriterConfig {
            batch_size: 500,
            queue_capacity: 100,
            ..WriterConfig::default()
        }
        .sanitized();

        assert_eq!(config.queue_capacity, 500);
    }

    #[test]
    fn log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.name, "app");
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.console_output);
        assert!(config.mask_sensitive);
        assert!(!config.json_console);
    }
}
