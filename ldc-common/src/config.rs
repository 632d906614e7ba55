//! Configuration file loading and root folder resolution
//!
//! Resolution priority for every setting that can come from several places:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable naming the working root folder
pub const ROOT_FOLDER_ENV: &str = "LDC_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "LDC_CONFIG";

/// Application directory name under the platform config/data dirs
const APP_DIR: &str = "ldc";

/// Resolve the working root folder
///
/// CLI argument → `LDC_ROOT_FOLDER` → TOML `root_folder` → platform data dir.
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_value: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Resolve which TOML config file to read, if any
///
/// An explicitly named file (CLI or `LDC_CONFIG`) must exist; the platform default
/// (`~/.config/ldc/config.toml` on Linux) is used only when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    let explicit = cli_arg.map(Path::to_path_buf).or_else(|| {
        std::env::var(CONFIG_FILE_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    Ok(default_config_path().filter(|p| p.exists()))
}

/// Parse a TOML config file, or return defaults when no file is given
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./ldc_data"))
}
