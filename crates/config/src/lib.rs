//! Configuration loading, env substitution and validation.
//!
//! Config files: `lectern.toml`, `lectern.yaml` or `lectern.json`.
//! Searched in `./` then the user config directory (`~/.config/lectern/`).
//!
//! `${ENV_VAR}` placeholders are substituted before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        CONFIG_FILENAMES, TOKEN_ENV_VAR, apply_env_overrides, config_dir, discover_and_load,
        find_config_file, load_config,
    },
    schema::{BroadcastConfig, GatewayConfig, InstructorConfig, LecternConfig, SessionConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
