//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Which store backend to run against, selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Memory,
}

impl BackendKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "sqlite" => Ok(BackendKind::Sqlite),
            "memory" => Ok(BackendKind::Memory),
            other => Err(Error::Config(format!("Unknown backend: {}", other))),
        }
    }
}

/// Optional TOML config file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub backend: Option<BackendKind>,
    /// Substitute the bundled dataset when a curriculum reload fails.
    /// The substitution is logged and tagged on the snapshot, never silent.
    pub fallback_to_bundled: Option<bool>,
}

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// Load the platform config file if one exists; a missing file is not an
/// error, it just yields defaults.
pub fn load_toml_config() -> Result<TomlConfig> {
    let Some(path) = config_file_path() else {
        return Ok(TomlConfig::default());
    };
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Bad config file {}: {}", path.display(), e)))
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("studyhall").join("config.toml"))
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("studyhall"))
        .unwrap_or_else(|| PathBuf::from("./studyhall_data"))
}
