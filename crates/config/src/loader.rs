use std::path::{Path, PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use crate::{
    env_subst::{has_placeholder, substitute_env},
    schema::LecternConfig,
};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &[
    "lectern.toml",
    "lectern.yaml",
    "lectern.yml",
    "lectern.json",
];

/// Environment variable consulted when the config carries no bot token.
pub const TOKEN_ENV_VAR: &str = "TELEGRAM_BOT_TOKEN";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<LecternConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./lectern.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/lectern/lectern.{toml,yaml,yml,json}`
///
/// Falls back to defaults (plus env overrides) if nothing is found or the
/// file cannot be loaded. Returns the path that was used, if any.
pub fn discover_and_load() -> (LecternConfig, Option<PathBuf>) {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => {
                info!(path = %path.display(), "config loaded");
                return (cfg, Some(path));
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    let mut config = LecternConfig::default();
    apply_env_overrides(&mut config);
    (config, None)
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists());
    if local.is_some() {
        return local;
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// User-global config directory (e.g. `~/.config/lectern/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "lectern").map(|d| d.config_dir().to_path_buf())
}

/// Fill the bot token from `TELEGRAM_BOT_TOKEN` when the config has none.
pub fn apply_env_overrides(config: &mut LecternConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut LecternConfig, lookup: impl Fn(&str) -> Option<String>) {
    let current = config.telegram.token.expose_secret();
    if !current.trim().is_empty() && !has_placeholder(current) {
        return;
    }
    if let Some(token) = lookup(TOKEN_ENV_VAR).filter(|t| !t.trim().is_empty()) {
        debug!("using bot token from {TOKEN_ENV_VAR}");
        config.telegram.token = Secret::new(token);
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<LecternConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
