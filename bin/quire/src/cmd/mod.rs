//! Command implementations.

pub mod build;
pub mod check;
pub mod tags;

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use quire_core::Config;
use quire_generator::Builder;

/// Load the configuration and create a builder whose directories resolve
/// against the configuration file's directory.
pub(crate) fn load_builder(config_path: &Path, drafts: bool) -> Result<Builder> {
    let mut config = Config::load_with_env(config_path).wrap_err_with(|| {
        format!("Failed to load configuration from {}", config_path.display())
    })?;
    if drafts {
        config.build.drafts = true;
    }
    tracing::debug!(?config, "Loaded configuration");

    let root = config_path.parent().unwrap_or_else(|| Path::new(""));
    Ok(Builder::new(config).with_root(root))
}
