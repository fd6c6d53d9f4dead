//! Standard locations for subwave configuration files

use std::path::PathBuf;

/// Directory holding subwave configuration
///
/// Returns: `$XDG_CONFIG_HOME/subwave` (or the platform equivalent), falling
/// back to `./subwave` when no config directory is known.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("subwave")
}

/// Path of a config file inside `default_config_dir()`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
