//! Configuration validation.
//!
//! Checks the loaded values the relay depends on and flags unknown keys in
//! the config file, which usually indicate a typo.

use std::{
    collections::HashMap,
    net::IpAddr,
    path::{Path, PathBuf},
};

use secrecy::ExposeSecret;

use crate::{
    env_subst::{has_placeholder, substitute_env},
    loader::TOKEN_ENV_VAR,
    schema::LecternConfig,
};

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
    /// "syntax", "unknown-field", "missing" or "value".
    pub category: &'static str,
    /// Dotted path, e.g. "session.ttl_secs".
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

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
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

/// Validate a loaded config, and the file it came from if there is one.
pub fn validate(config: &LecternConfig, config_path: Option<&Path>) -> ValidationResult {
    let mut diagnostics = Vec::new();

    match config_path {
        Some(path) => check_file(path, &mut diagnostics),
        None => diagnostics.push(Diagnostic::new(
            Severity::Info,
            "missing",
            "",
            "no config file found; using defaults",
        )),
    }
    check_values(config, &mut diagnostics);

    diagnostics.sort_by_key(|d| d.severity);
    ValidationResult {
        diagnostics,
        config_path: config_path.map(Path::to_path_buf),
    }
}

fn check_values(config: &LecternConfig, diagnostics: &mut Vec<Diagnostic>) {
    let token = config.telegram.token.expose_secret();
    if token.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "missing",
            "telegram.token",
            format!("bot token is not set (config file or {TOKEN_ENV_VAR})"),
        ));
    } else if has_placeholder(token) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "missing",
            "telegram.token",
            "bot token references an unset environment variable",
        ));
    }

    let username = config.instructor.username.trim().trim_start_matches('@');
    if username.is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "missing",
            "instructor.username",
            "instructor username is empty; nobody could broadcast",
        ));
    } else if username.chars().any(char::is_whitespace) {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "value",
            "instructor.username",
            "Telegram usernames cannot contain whitespace",
        ));
    }

    if config.session.ttl_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "value",
            "session.ttl_secs",
            "session TTL must be greater than zero",
        ));
    }

    if config.broadcast.max_in_flight == Some(0) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "value",
            "broadcast.max_in_flight",
            "max_in_flight must be at least 1 (omit it for no limit)",
        ));
    }

    if config.telegram.poll_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "value",
            "telegram.poll_timeout_secs",
            "a zero poll timeout turns long polling into busy polling",
        ));
    }

    if config.gateway.bind.parse::<IpAddr>().is_err() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "value",
            "gateway.bind",
            format!("'{}' is not an IP address", config.gateway.bind),
        ));
    }
    if config.gateway.port == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "value",
            "gateway.port",
            "port 0 binds a random port",
        ));
    }
}

// ── Unknown-field detection ─────────────────────────────────────────────────

fn known_keys() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("instructor", &["username"][..]),
        ("session", &["ttl_secs"][..]),
        ("broadcast", &["max_in_flight"][..]),
        ("telegram", &["token", "poll_timeout_secs"][..]),
        ("gateway", &["bind", "port"][..]),
    ])
}

fn check_file(path: &Path, diagnostics: &mut Vec<Diagnostic>) {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => substitute_env(&raw),
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read {}: {e}", path.display()),
            ));
            return;
        },
    };

    match parse_value(&raw, path) {
        Ok(value) => check_unknown_fields(&value, diagnostics),
        Err(message) => diagnostics.push(Diagnostic::new(Severity::Error, "syntax", "", message)),
    }
}

fn parse_value(raw: &str, path: &Path) -> Result<serde_json::Value, String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parsed = match ext {
        "toml" => toml::from_str::<toml::Value>(raw)
            .map_err(|e| e.to_string())
            .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str::<serde_json::Value>(raw).map_err(|e| e.to_string()),
        "json" => serde_json::from_str::<serde_json::Value>(raw).map_err(|e| e.to_string()),
        other => return Err(format!("unsupported config format: .{other}")),
    };
    parsed.map_err(|e| format!("{ext} syntax error: {e}"))
}

fn check_unknown_fields(value: &serde_json::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_object() else {
        // An empty YAML document parses as null.
        if !value.is_null() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                "config root must be a table",
            ));
        }
        return;
    };

    let known = known_keys();
    for (section, body) in root {
        let Some(fields) = known.get(section.as_str()) else {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "unknown-field",
                section.clone(),
                format!("unknown section '{section}'"),
            ));
            continue;
        };
        let Some(body) = body.as_object() else {
            continue;
        };
        for key in body.keys() {
            if !fields.contains(&key.as_str()) {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "unknown-field",
                    format!("{section}.{key}"),
                    format!("unknown field '{key}' in [{section}]"),
                ));
            }
        }
    }
}
