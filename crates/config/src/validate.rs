//! Configuration validation.
//!
//! Checks a config file against the known schema, flags unknown or
//! misspelled fields, and reports settings that would keep the bridge from
//! delivering notifications.

use std::{collections::HashMap, path::Path};

use crate::{env_subst::substitute_env, schema::AppConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "unknown-field", "type-error", "credentials", "security", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "gotify.url"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Expected shape of the configuration tree.
enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        ("slack", Struct(HashMap::from([("token", Leaf), ("slack_token", Leaf)]))),
        ("gotify", Struct(HashMap::from([("url", Leaf), ("token", Leaf)]))),
    ]))
}

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut curr = Vec::with_capacity(prev.len());
        curr.push(i + 1);
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr.push(substitution.min(prev[j + 1] + 1).min(curr[j] + 1));
        }
        prev = curr;
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let ext = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("toml");

    let mut result = match std::fs::read_to_string(actual_path) {
        Ok(content) => {
            let content = substitute_env(&content);
            match ext {
                "yaml" | "yml" => validate_yaml_str(&content),
                "json" => validate_json_str(&content),
                _ => validate_toml_str(&content),
            }
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path.clone());
    result
}

/// Validate a TOML string without touching the file system.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let parsed = toml::from_str::<toml::Value>(toml_str)
        .map_err(|e| format!("TOML syntax error: {e}"))
        .and_then(|v| serde_json::to_value(v).map_err(|e| format!("TOML syntax error: {e}")));
    validate_tree(parsed)
}

/// Validate a YAML string without touching the file system.
#[must_use]
pub fn validate_yaml_str(yaml_str: &str) -> ValidationResult {
    validate_tree(
        serde_yaml::from_str::<serde_json::Value>(yaml_str)
            .map_err(|e| format!("YAML syntax error: {e}")),
    )
}

/// Validate a JSON string without touching the file system.
#[must_use]
pub fn validate_json_str(json_str: &str) -> ValidationResult {
    validate_tree(
        serde_json::from_str::<serde_json::Value>(json_str)
            .map_err(|e| format!("JSON syntax error: {e}")),
    )
}

/// Shared checks once a document has been parsed, whatever its format.
fn validate_tree(parsed: Result<serde_json::Value, String>) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let tree = match parsed {
        // An empty YAML document.
        Ok(serde_json::Value::Null) => serde_json::Value::Object(serde_json::Map::new()),
        Ok(tree) => tree,
        Err(message) => {
            diagnostics.push(Diagnostic::new(Severity::Error, "syntax", "", message));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&tree, &build_schema_map(), "", &mut diagnostics);

    match serde_json::from_value::<AppConfig>(tree) {
        Ok(config) => check_semantic_warnings(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (serde_json::Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".to_string(),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-field",
            path,
            message,
        ));
    }
}

fn check_semantic_warnings(config: &AppConfig, diagnostics: &mut Vec<Diagnostic>) {
    use secrecy::ExposeSecret;

    let slack_token = config.slack.token.expose_secret();
    if slack_token.is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credentials",
            "slack.token",
            "no Slack token configured; the bridge cannot be enabled",
        ));
    } else if slack_token.contains("${") {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credentials",
            "slack.token",
            "Slack token references an unset environment variable",
        ));
    }

    if config.gotify.token.expose_secret().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "credentials",
            "gotify.token",
            "no Gotify application token configured; notifications will be rejected",
        ));
    }

    match url::Url::parse(&config.gotify.url) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "type-error",
                "gotify.url",
                format!("unsupported scheme \"{}\"", url.scheme()),
            ));
        },
        Ok(url) if url.scheme() == "http" && !is_localhost(&url) => {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "security",
                "gotify.url",
                "plain http to a remote host sends the application token in cleartext",
            ));
        },
        Ok(_) => {},
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "gotify.url",
            format!("invalid URL: {e}"),
        )),
    }
}

fn is_localhost(url: &url::Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost" | "127.0.0.1" | "[::1]" | "::1")
    )
}
