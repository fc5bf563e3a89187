//! Configuration loading, env substitution, and validation.
//!
//! Config files: `gotify-slack.toml`, `gotify-slack.yaml`, or `gotify-slack.json`
//! Searched in `./` then `~/.config/gotify-slack/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{AppConfig, GotifyConfig, SlackConfig, redacted},
    validate::{Diagnostic, Severity, ValidationResult},
};
