//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::config::FleetConfig;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_ENV: &str = "LABFLEET_CONFIG";

/// Production implementation of `ConfigStore` that reads a YAML file on disk.
///
/// The file is optional and never written by the tool.
#[derive(Debug, Default)]
pub struct YamlConfigStore {
    path: Option<PathBuf>,
}

impl YamlConfigStore {
    /// Store at the default location (`$LABFLEET_CONFIG` or
    /// `~/.labfleet/config.yaml`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store at an explicit path, e.g. from `--config`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<FleetConfig> {
        let path = self.path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(FleetConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(FleetConfig::default());
        }
        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV)
            && !val.is_empty()
        {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".labfleet").join("config.yaml"))
    }
}
