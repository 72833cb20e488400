use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use unichat::UniChatConfig;

const CONFIG_DIR: &str = "unichat";
const CONFIG_FILE: &str = "config.toml";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the configuration. An explicit path must exist; the default path
/// falls back to built-in defaults when absent.
pub fn load(path: Option<&Path>) -> Result<UniChatConfig> {
    let config = match path {
        Some(path) => read(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => read(&path)?,
            None => {
                debug!("No configuration file, using defaults");
                UniChatConfig::default()
            }
        },
    };
    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> Result<UniChatConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}
