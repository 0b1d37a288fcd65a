//! CLI command implementations.

pub mod config;
pub mod evaluate;
pub mod prompts;
pub mod status;

use std::path::Path;
use vlmeval_core::config::expand_path;
use vlmeval_core::{Config, ConfigError};

/// Load the config from `--config` if given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load_from(&expand_path(path)),
        None => Config::load(),
    }
}
