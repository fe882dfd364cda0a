use crate::config::env_or;
use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connection settings for [`PostgresSink`].
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    pub table: String,
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        PostgresConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "logs".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            schema: "public".to_string(),
            table: "application_logs".to_string(),
            max_connections: 2,
        }
    }
}

impl PostgresConfig {
    /// Build from `LOG_DB_*` environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = PostgresConfig::default();
        PostgresConfig {
            host: env_or("LOG_DB_HOST", &defaults.host),
            port: env_or("LOG_DB_PORT", "5432").parse().unwrap_or(defaults.port),
            database: env_or("LOG_DB_NAME", &defaults.database),
            user: env_or("LOG_DB_USER", &defaults.user),
            password: env_or("LOG_DB_PASSWORD", &defaults.password),
            schema: env_or("LOG_DB_SCHEMA", &defaults.schema),
            table: env_or("LOG_DB_TABLE", &defaults.table),
            max_connections: defaults.max_connections,
        }
    }

    /// Standard Postgres DSN for this config.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }

    fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Postgres implementation of [`LogSink`] over an sqlx connection pool.
///
/// Each batch is inserted inside a single transaction, so a batch either
/// lands completely or not at all and can safely be retried by the writer.
/// The expected table:
///
/// ```sql
/// CREATE TABLE application_logs (
///   ts           timestamptz   NOT NULL,
///   level        text          NOT NULL,
///   logger_name  text          NOT NULL,
///   message      text          NOT NULL,
///   module       text,
///   function     text,
///   line_number  int4,
///   thread_id    int8          NOT NULL,
///   process_id   int8          NOT NULL,
///   exception    text,
///   extra_fields jsonb         NOT NULL,
///   environment  text          NOT NULL,
///   hostname     text          NOT NULL
/// );
/// ```
pub struct PostgresSink {
    pool: PgPool,
    insert_sql: String,
}

impl PostgresSink {
    /// Create a sink from explicit settings.
    ///
    /// The pool connects lazily, so this succeeds even while the store is
    /// down; the first write or health check surfaces the failure and the
    /// writer's reconnect loop takes it from there.
    pub fn new(config: PostgresConfig) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy(&config.url())
            .map_err(classify)?;

        Ok(Self::with_pool(pool, &config))
    }

    /// Reuse an existing pool, e.g. the application's own.
    pub fn with_pool(pool: PgPool, config: &PostgresConfig) -> Self {
        let insert_sql = format!(
            "INSERT INTO {} \
             (ts, level, logger_name, message, module, function, line_number, \
              thread_id, process_id, exception, extra_fields, environment, hostname) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            config.qualified_table()
        );
        PostgresSink { pool, insert_sql }
    }
}

#[async_trait]
impl LogSink for PostgresSink {
    async fn connect(&self) -> Result<(), SinkError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn write(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        for record in batch {
            let extra = serde_json::to_value(&record.extra_fields)
                .map_err(|e| SinkError::Rejected(e.to_string()))?;

            sqlx::query(&self.insert_sql)
                .bind(record.timestamp)
                .bind(record.level.as_str())
                .bind(&record.logger_name)
                .bind(&record.message)
                .bind(&record.module)
                .bind(&record.function)
                .bind(record.line_number.map(|l| l as i32))
                .bind(record.thread_id as i64)
                .bind(record.process_id as i64)
                .bind(&record.exception)
                .bind(extra)
                .bind(record.environment.as_str())
                .bind(&record.hostname)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)
    }
}

/// Map sqlx failures onto the writer's retryable/fatal taxonomy.
fn classify(error: sqlx::Error) -> SinkError {
    match error {
        sqlx::Error::Io(e) => SinkError::Connection(e.to_string()),
        sqlx::Error::PoolTimedOut => SinkError::Timeout("connection pool timed out".to_string()),
        sqlx::Error::PoolClosed => SinkError::Connection("connection pool closed".to_string()),
        sqlx::Error::Configuration(e) => SinkError::Auth(e.to_string()),
        sqlx::Error::Database(e) => SinkError::Rejected(e.to_string()),
        // Unknown failures stay retryable; dropping data needs certainty.
        other => SinkError::Timeout(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_a_standard_dsn() {
        let config = PostgresConfig {
            host: "db.internal".into(),
            port: 5433,
            database: "logs".into(),
            user: "writer".into(),
            password: "pw".into(),
            ..PostgresConfig::default()
        };
        assert_eq!(config.url(), "postgres://writer:pw@db.internal:5433/logs");
    }

    #[test]
    fn io_errors_are_retryable() {
        let error = classify(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(error.is_retryable());
    }

    #[test]
    fn pool_timeouts_are_retryable() {
        assert!(classify(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(classify(sqlx::Error::PoolClosed).is_retryable());
    }

    #[test]
    fn unknown_errors_default_to_retryable() {
        assert!(classify(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn insert_targets_the_configured_table() {
        let config = PostgresConfig {
            schema: "logging".into(),
            table: "events".into(),
            ..PostgresConfig::default()
        };
        let pool = PgPoolOptions::new().connect_lazy(&config.url()).unwrap();
        let sink = PostgresSink::with_pool(pool, &config);
        assert!(sink.insert_sql.starts_with("INSERT INTO logging.events "));
    }
}
