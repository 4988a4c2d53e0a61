// src/config.rs

//! Configuration loading utilities.
//!
//! The CLI reads a TOML file next to its data directory; Lambda functions read
//! an optional file named by `CONFIG_PATH` and then apply environment overrides.

use std::path::Path;

use tracing::info;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load configuration from a TOML file, falling back to defaults when the file
/// does not exist. A file that exists but does not parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let config = Config::load(path)
        .map_err(|e| AppError::config(format!("Invalid config {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Configuration for a Lambda invocation.
pub fn config_from_env() -> Result<Config> {
    config_from_vars(|key| std::env::var(key).ok())
}

/// Same as [`config_from_env`] over an arbitrary variable lookup.
pub fn config_from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config = match lookup("CONFIG_PATH").filter(|p| !p.trim().is_empty()) {
        Some(path) => Config::load(&path)
            .map_err(|e| AppError::config(format!("Invalid config {path}: {e}")))?,
        None => Config::default(),
    };
    config.apply_vars(lookup);
    config.validate()?;
    Ok(config)
}
