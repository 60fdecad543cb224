mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./pubforge.toml",
        "~/.config/pubforge/config.toml",
        "/etc/pubforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let mut ids = HashSet::new();
    for plugin in config.all_plugins() {
        if plugin.id.trim().is_empty() {
            anyhow::bail!("Plugin of kind '{}' has an empty id", plugin.kind);
        }
        if !ids.insert(plugin.id.as_str()) {
            anyhow::bail!("Plugin id '{}' is used more than once", plugin.id);
        }
    }

    if config.catalog.path.as_os_str().is_empty() {
        anyhow::bail!("Catalog path cannot be empty");
    }

    if config.collectors.is_empty() {
        tracing::warn!("No collectors configured; collection will find nothing");
    }

    Ok(())
}
