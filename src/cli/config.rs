// ABOUTME: Configuration management for the filter-builder CLI
// ABOUTME: Loads logging settings from a config file and environment overrides

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(p),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_yaml::from_str(&contents)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            _ => Config::default(),
        };

        config.merge_env();
        Ok(config)
    }

    /// Working directory first, then the home directory
    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from("filter-builder.yaml");
        if local.exists() {
            return Some(local);
        }

        dirs::home_dir()
            .map(|home| home.join(".filter-builder").join("config.yaml"))
            .filter(|path| path.exists())
    }

    fn merge_env(&mut self) {
        if let Ok(level) = std::env::var("FILTER_BUILDER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FILTER_BUILDER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}
