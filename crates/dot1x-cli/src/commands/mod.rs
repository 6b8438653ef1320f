//! Command implementations.

pub mod auth;
pub mod config;
pub mod supplicant;

use std::path::PathBuf;

use color_eyre::eyre::{Context, Result};
use dot1x_daemon::DaemonConfig;

/// Loads the configuration from the given path or the platform default.
pub fn load_config(path: Option<PathBuf>) -> Result<DaemonConfig> {
    let path = path.unwrap_or_else(DaemonConfig::default_path);
    DaemonConfig::load(&path).wrap_err_with(|| format!("loading {}", path.display()))
}
