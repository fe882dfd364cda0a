use crate::record::LogRecord;
use regex::Regex;

/// Key fragments treated as sensitive. A key matches when it contains any of
/// these, case-insensitively.
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "token",
    "secret",
    "api_key",
    "apikey",
    "access_key",
    "private_key",
    "credential",
    "auth",
    "bearer",
    "authorization",
];

const MASK: &str = "***MASKED***";

/// Masks sensitive content before a record reaches the persistence core.
///
/// Two passes: `key=value` / `key: value` pairs inside the message text are
/// rewritten, and extra-field values whose key looks sensitive are replaced
/// wholesale. The record itself is otherwise untouched.
pub struct SensitiveDataFilter {
    patterns: Vec<String>,
    regexes: Vec<Regex>,
}

impl Default for SensitiveDataFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl SensitiveDataFilter {
    /// Build a filter from the built-in pattern list plus caller additions.
    pub fn new(additional_patterns: &[&str]) -> Self {
        let patterns: Vec<String> = SENSITIVE_PATTERNS
            .iter()
            .chain(additional_patterns)
            .map(|p| p.to_lowercase())
            .collect();

        let regexes = patterns
            .iter()
            .map(|p| {
                // key=value, key: value, key="value" and friends.
                Regex::new(&format!(
                    r#"(?i)({}['"]?\s*[:=]\s*['"]?)([^'",\s}}]+)"#,
                    regex::escape(p)
                ))
                .expect("sensitive pattern regex")
            })
            .collect();

        SensitiveDataFilter { patterns, regexes }
    }

    /// Rewrite sensitive `key=value` pairs in free-form text.
    pub fn mask_message(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        if !self.patterns.iter().any(|p| lower.contains(p.as_str())) {
            return text.to_string();
        }

        let mut masked = text.to_string();
        for regex in &self.regexes {
            masked = regex.replace_all(&masked, format!("${{1}}{MASK}")).into_owned();
        }
        masked
    }

    /// Replace the values of extra fields whose key contains a sensitive
    /// pattern.
    pub fn redact_fields(&self, fields: &mut std::collections::BTreeMap<String, serde_json::Value>) {
        for (key, value) in fields.iter_mut() {
            let lower = key.to_lowercase();
            if self.patterns.iter().any(|p| lower.contains(p.as_str())) {
                *value = serde_json::Value::String(MASK.to_string());
            }
        }
    }

    /// Apply both passes to a record in place.
    pub fn apply(&self, record: &mut LogRecord) {
        record.message = self.mask_message(&record.message);
        self.redact_fields(&mut record.extra_fields);
    }
}
