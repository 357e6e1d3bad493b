// Configuration loader with environment variable substitution

use super::types::*;
use super::url::parse_store_url;
use crate::storage::StoreFactory;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<KvConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::load_str(&content)
    }

    /// Parse and validate configuration text
    pub fn load_str(content: &str) -> Result<KvConfig> {
        // Substitute environment variables
        let content = Self::substitute_env_vars(content);

        // Parse YAML
        let config: KvConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        // Validate configuration
        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${DATA_DIR:-/var/lib/kvstack} -> /var/lib/kvstack (if DATA_DIR not set)
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        // Keep original if no default and var not found
                        format!("${{{}}}", var_name)
                    }
                }
            }
        }).to_string()
    }

    /// Validate configuration
    pub fn validate(config: &KvConfig) -> Result<()> {
        // Validate logging
        match config.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("logging.level must be one of trace, debug, info, warn, error; got '{}'", other),
        }

        match config.logging.format.as_str() {
            "text" | "compact" => {}
            other => bail!("logging.format must be 'text' or 'compact'; got '{}'", other),
        }

        // Validate store source and its plan
        let spec = match (&config.store, &config.url) {
            (Some(spec), None) => spec.clone(),
            (None, Some(url)) => parse_store_url(url).context("Invalid url")?,
            (Some(_), Some(_)) => bail!("Only one of 'store' and 'url' may be set"),
            (None, None) => bail!("One of 'store' or 'url' is required"),
        };

        StoreFactory::plan(&spec).context("Invalid store configuration")?;

        Ok(())
    }
}
