//! `lectern check-config`: print validation diagnostics and fail on errors.

use std::path::Path;

use {
    anyhow::Result,
    lectern_config::{LecternConfig, Severity, ValidationResult, validate},
};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn label(severity: Severity) -> (&'static str, &'static str) {
    match severity {
        Severity::Error => ("fail", RED),
        Severity::Warning => ("warn", YELLOW),
        Severity::Info => ("info", CYAN),
    }
}

pub fn check_config(config: &LecternConfig, config_path: Option<&Path>) -> Result<()> {
    let result = validate(config, config_path);
    println!("{}", render(&result));
    if result.has_errors() {
        anyhow::bail!(
            "configuration has {} error(s)",
            result.count(Severity::Error)
        );
    }
    Ok(())
}

fn render(result: &ValidationResult) -> String {
    let mut out = String::new();
    let source = result
        .config_path
        .as_ref()
        .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    out.push_str(&format!("{BOLD}lectern config{RESET} ({source})\n"));

    for d in &result.diagnostics {
        let (text, color) = label(d.severity);
        let path = if d.path.is_empty() {
            String::new()
        } else {
            format!(" {}", d.path)
        };
        out.push_str(&format!("  [{color}{text}{RESET}]{path}: {}\n", d.message));
    }

    if !result.has_errors() {
        out.push_str(&format!("  [{GREEN}ok{RESET}] configuration is usable\n"));
    }
    out
}
