//! Configuration discovery for the CLI
//!
//! The effective configuration is built from, in increasing priority:
//! - Built-in defaults
//! - A configuration file (`--config`, `MORPH_CONFIG`, or `morph.{toml,yaml,yml,json}`
//!   in the working directory)
//! - `MORPH_*` environment variables, including those loaded from `.env`

use crate::error::{Error, Result};
use morph_core::MorphConfig;
use std::path::{Path, PathBuf};

/// File names probed when no configuration path is given
const DEFAULT_CONFIG_FILES: [&str; 4] = ["morph.toml", "morph.yaml", "morph.yml", "morph.json"];

/// Find the configuration file to use, if any
pub fn discover_config_path(explicit: Option<&Path>, dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    Ok(DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file()))
}

/// Load the effective configuration
pub fn load_config(explicit: Option<&Path>) -> Result<MorphConfig> {
    let cwd = std::env::current_dir()?;
    let path = discover_config_path(explicit, &cwd)?;

    match &path {
        Some(path) => tracing::info!(path = %path.display(), "Loading configuration file"),
        None => tracing::debug!("No configuration file found, using defaults"),
    }

    Ok(MorphConfig::load(path.as_deref())?)
}
