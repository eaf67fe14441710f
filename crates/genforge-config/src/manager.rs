//! Configuration manager implementation

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};

use crate::{
    error::{ConfigError, Result},
    types::GenforgeConfig,
};

const ENV_PREFIX: &str = "GENFORGE";

/// Loads, validates and saves [`GenforgeConfig`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
    /// Explicit environment, used instead of the process environment
    env_override: Option<HashMap<String, String>>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Create with custom config path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            env_prefix: ENV_PREFIX.to_string(),
            env_override: None,
        }
    }

    /// Read environment variables from `vars` instead of the process environment
    pub fn with_environment(mut self, vars: HashMap<String, String>) -> Self {
        self.env_override = Some(vars);
        self
    }

    /// Path of the TOML file this manager reads and writes
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("genforge")
            .join("config.toml")
    }

    /// Load defaults, then the config file if present, then the environment
    pub fn load_config(&self) -> Result<GenforgeConfig> {
        let defaults = toml::to_string(&GenforgeConfig::default())?;

        let environment = Environment::with_prefix(&self.env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("render.exclude")
            .source(self.env_override.clone());

        let builder = Config::builder()
            .add_source(File::from_str(&defaults, FileFormat::Toml))
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(environment);

        let config: GenforgeConfig = builder.build()?.try_deserialize()?;
        self.validate_config(&config)?;

        debug!("Loaded configuration from {}", self.config_path.display());
        Ok(config)
    }

    /// Write `config` to the config file as TOML
    pub fn save_config(&self, config: &GenforgeConfig) -> Result<()> {
        self.validate_config(config)?;

        let toml = toml::to_string_pretty(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;

        info!("Saved configuration to {}", self.config_path.display());
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate_config(&self, config: &GenforgeConfig) -> Result<()> {
        if config.render.binary_sniff_bytes == 0 {
            return Err(ConfigError::Validation(
                "render.binary_sniff_bytes must be greater than 0".to_string(),
            ));
        }
        if config.staging.staging_root == config.staging.backup_root {
            return Err(ConfigError::Validation(
                "staging.staging_root and staging.backup_root must differ".to_string(),
            ));
        }
        if config.log_level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "log_level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
