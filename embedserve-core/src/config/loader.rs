//! Configuration loader

use crate::config::EmbedserveConfig;
use crate::error::{Error, Result};
use std::path::Path;

/// Configuration loader for various formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<EmbedserveConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config = match ext {
            "json" => Self::from_json(&content)?,
            "toml" | "" => Self::from_toml(&content)?,
            _ => return Err(Error::Config(format!("Unknown config format: {}", ext))),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<EmbedserveConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<EmbedserveConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }
}
