// Configuration module for kvstack
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Store URL parsing
// - Configuration validation
// - Default values

pub mod types;
pub mod url;
mod loader;

pub use types::*;
pub use url::parse_store_url;
pub use loader::ConfigLoader;

use crate::error::StoreResult;
use crate::storage::{SharedStore, StoreFactory};
use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<KvConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<KvConfig> {
    let mut config = load_config(path)?;

    // Allow environment variables to override config values
    if let Ok(url) = std::env::var("KVSTACK_URL") {
        config.store = None;
        config.url = Some(url);
    }

    if let Ok(level) = std::env::var("KVSTACK_LOG_LEVEL") {
        config.logging.level = level;
    }

    ConfigLoader::validate(&config).context("Invalid configuration after environment overrides")?;

    Ok(config)
}

impl KvConfig {
    /// Declarative store description, whichever form the file used.
    pub fn store_spec(&self) -> StoreResult<StoreSpec> {
        match (&self.store, &self.url) {
            (Some(spec), _) => Ok(spec.clone()),
            (None, Some(url)) => parse_store_url(url),
            (None, None) => Err(crate::error::StoreError::configuration(
                "no 'store' or 'url' configured",
            )),
        }
    }

    /// Build the configured store.
    pub fn build_store(&self) -> StoreResult<SharedStore> {
        StoreFactory::build(&self.store_spec()?)
    }
}
