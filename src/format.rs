use crate::record::{Level, LogRecord};

const RESET: &str = "\x1b[0m";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Debug => "\x1b[36m",    // cyan
        Level::Info => "\x1b[32m",     // green
        Level::Warning => "\x1b[33m",  // yellow
        Level::Error => "\x1b[31m",    // red
        Level::Critical => "\x1b[35m", // magenta
    }
}

fn source_location(record: &LogRecord) -> Option<String> {
    match (&record.module, &record.function, record.line_number) {
        (Some(module), Some(function), Some(line)) => Some(format!("{module}.{function}:{line}")),
        (Some(module), Some(function), None) => Some(format!("{module}.{function}")),
        _ => None,
    }
}

/// Render a record for a terminal, with the level colored by severity.
pub fn format_console(record: &LogRecord) -> String {
    let mut line = format!(
        "{}{}{} | {} | {}",
        level_color(record.level),
        record.level,
        RESET,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.logger_name,
    );
    if let Some(location) = source_location(record) {
        line.push_str(&format!(" | {location}"));
    }
    line.push_str(&format!(" | {}", record.message));
    if let Some(exception) = &record.exception {
        line.push('\n');
        line.push_str(exception);
    }
    line
}

/// Render a record without ANSI escapes, for redirected output.
pub fn format_plain(record: &LogRecord) -> String {
    let mut line = format!(
        "{} | {} | {} | {} | {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.level,
        record.environment,
        record.logger_name,
        record.message,
    );
    if let Some(exception) = &record.exception {
        line.push('\n');
        line.push_str(exception);
    }
    line
}

/// Render a record as one JSON object per line, for log aggregators.
///
/// Extra fields are flattened into the root object; `exception` and
/// `environment` appear only when set, matching the shape the relational
/// sink persists.
pub fn format_json(record: &LogRecord) -> String {
    let mut object = serde_json::Map::new();
    object.insert("timestamp".into(), serde_json::json!(record.timestamp.to_rfc3339()));
    object.insert("level".into(), serde_json::json!(record.level.as_str()));
    object.insert("logger".into(), serde_json::json!(record.logger_name));
    object.insert("message".into(), serde_json::json!(record.message));
    if let Some(module) = &record.module {
        object.insert("module".into(), serde_json::json!(module));
    }
    if let Some(function) = &record.function {
        object.insert("function".into(), serde_json::json!(function));
    }
    if let Some(line) = record.line_number {
        object.insert("line".into(), serde_json::json!(line));
    }
    if let Some(exception) = &record.exception {
        object.insert("exception".into(), serde_json::json!(exception));
    }
    for (key, value) in &record.extra_fields {
        object.insert(key.clone(), value.clone());
    }
    object.insert("environment".into(), serde_json::json!(record.environment.as_str()));
    object.insert("hostname".into(), serde_json::json!(record.hostname));

    serde_json::Value::Object(object).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Environment;
    use serde_json::json;

    fn record() -> LogRecord {
        LogRecord::new(Level::Error, "app.db", "query failed")
            .with_source("db", "run", 7)
            .with_extra("query_id", json!(99))
            .in_environment(Environment::Production)
    }

    #[test]
    fn console_format_colors_the_level() {
        let line = format_console(&record());
        assert!(line.starts_with("\x1b[31mERROR\x1b[0m"));
        assert!(line.contains("app.db"));
        assert!(line.contains("db.run:7"));
        assert!(line.contains("query failed"));
    }

    #[test]
    fn plain_format_has_no_ansi_escapes() {
        let line = format_plain(&record());
        assert!(!line.contains('\x1b'));
        assert!(line.contains("ERROR"));
        assert!(line.contains("production"));
    }

    #[test]
    fn exception_text_lands_on_its_own_line() {
        let rec = record().with_exception("boom\n  at main");
        let line = format_console(&rec);
        assert!(line.ends_with("boom\n  at main"));
    }

    #[test]
    fn json_format_flattens_extra_fields() {
        let parsed: serde_json::Value = serde_json::from_str(&format_json(&record())).unwrap();
        assert_eq!(parsed["level"], "ERROR");
        assert_eq!(parsed["logger"], "app.db");
        assert_eq!(parsed["query_id"], 99);
        assert_eq!(parsed["environment"], "production");
        assert_eq!(parsed["line"], 7);
        assert!(parsed.get("exception").is_none());
    }
}
