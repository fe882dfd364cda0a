use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" | "FATAL" => Ok(Level::Critical),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(String);

/// Deployment environment a record was emitted from. Used for routing and
/// console formatting decisions upstream of the persistence core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown environment: {0}")]
pub struct ParseEnvironmentError(String);

/// One structured log event plus its enrichment.
///
/// A record is built at the call site and never mutated after it has been
/// enqueued; the writer only reads it for batching and serialization to the
/// sink. `extra_fields` is an open mapping of caller-supplied context that
/// passes through to the sink untouched.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger_name: String,
    pub message: String,
    pub module: Option<String>,
    pub function: Option<String>,
    pub line_number: Option<u32>,
    pub thread_id: u64,
    pub process_id: u32,
    pub exception: Option<String>,
    pub extra_fields: BTreeMap<String, serde_json::Value>,
    pub environment: Environment,
    pub hostname: String,
}

impl LogRecord {
    /// Create a record stamped with the current time, the calling thread and
    /// process ids and the cached process hostname.
    pub fn new(level: Level, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            message: message.into(),
            module: None,
            function: None,
            line_number: None,
            thread_id: current_thread_id(),
            process_id: std::process::id(),
            exception: None,
            extra_fields: BTreeMap::new(),
            environment: Environment::default(),
            hostname: process_hostname().to_string(),
        }
    }

    /// Attach source-location metadata.
    pub fn with_source(
        mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        line_number: u32,
    ) -> Self {
        self.module = Some(module.into());
        self.function = Some(function.into());
        self.line_number = Some(line_number);
        self
    }

    /// Add one extra context field.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_fields.insert(key.into(), value);
        self
    }

    /// Attach formatted exception text.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn in_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

/// Hostname resolved once per process.
pub fn process_hostname() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string())
    })
}

/// Stable numeric id for the current thread.
///
/// Stable Rust does not expose `ThreadId` as an integer, so this hashes the
/// opaque id once per thread and caches the result.
pub fn current_thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    thread_local! {
        static CACHED: OnceLock<u64> = const { OnceLock::new() };
    }

    CACHED.with(|cell| {
        *cell.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            std::thread::current().id().hash(&mut hasher);
            hasher.finish()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_follows_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn level_parses_common_spellings() {
        assert_eq!("debug".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Critical".parse::<Level>().unwrap(), Level::Critical);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn environment_parses_short_forms() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn record_is_stamped_with_process_metadata() {
        let record = LogRecord::new(Level::Info, "app.core", "started");
        assert_eq!(record.process_id, std::process::id());
        assert_eq!(record.thread_id, current_thread_id());
        assert!(!record.hostname.is_empty());
        assert!(record.extra_fields.is_empty());
    }

    #[test]
    fn thread_id_is_stable_within_a_thread_and_distinct_across() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());

        let other = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, other);
    }

    #[test]
    fn builder_helpers_fill_optional_fields() {
        let record = LogRecord::new(Level::Error, "app.db", "query failed")
            .with_source("db", "run_query", 42)
            .with_extra("query_id", serde_json::json!(7))
            .with_exception("timeout after 5s")
            .in_environment(Environment::Production);

        assert_eq!(record.module.as_deref(), Some("db"));
        assert_eq!(record.function.as_deref(), Some("run_query"));
        assert_eq!(record.line_number, Some(42));
        assert_eq!(record.extra_fields["query_id"], serde_json::json!(7));
        assert_eq!(record.exception.as_deref(), Some("timeout after 5s"));
        assert_eq!(record.environment, Environment::Production);
    }
}
