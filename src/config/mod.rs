// src/config/mod.rs
mod schema;

use std::path::{Path, PathBuf};
use config::{Config as ConfigLoader, FileFormat};
use tracing::{info, warn};

pub use schema::{
    Config, GlobalConfig, ToolsConfig, AdvisorConfig,
    SynthesisConfig, GraphConfig
};

use crate::error::{ReconResult, ReconError};

/// Centralized configuration handling
impl Config {
    /// Load configuration: built-in defaults, then a user file, then `RECON_*` variables
    pub fn load(config_path: Option<&Path>) -> ReconResult<Self> {
        info!("Loading configuration");

        let mut config_builder = ConfigLoader::builder();

        // Default configuration
        config_builder = config_builder.add_source(
            config::File::from_str(
                include_str!("../../config/default.toml"),
                FileFormat::Toml
            )
        );

        // User-provided configuration
        if let Some(path) = config_path {
            if path.exists() {
                config_builder = config_builder.add_source(config::File::from(path));
                info!("Loading user configuration from: {}", path.display());
            } else {
                warn!("Specified configuration file not found: {}", path.display());
            }
        } else {
            let default_path = Self::get_default_config_path();
            if default_path.exists() {
                config_builder = config_builder.add_source(config::File::from(default_path.as_path()));
                info!("Loading default configuration from: {}", default_path.display());
            } else {
                info!("No existing configuration found, using built-in defaults");
            }
        }

        // Environment variables, e.g. RECON_TOOLS__MAX_CONCURRENT=8
        config_builder = config_builder.add_source(
            config::Environment::with_prefix("RECON")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
        );

        let config: Config = config_builder
            .build()
            .map_err(|e| ReconError::ConfigError(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ReconError::ConfigError(format!("Failed to parse configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration path
    pub fn get_default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".recon-again/config.toml")
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> ReconResult<()> {
        if self.tools.max_concurrent == 0 {
            return Err(ReconError::ConfigError("tools.max_concurrent must be at least 1".to_string()));
        }
        if self.tools.timeout_seconds == 0 {
            return Err(ReconError::ConfigError("tools.timeout_seconds must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ReconResult<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ReconError::ConfigError(format!("Failed to serialize configuration: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReconError::FileError {
                    path: parent.to_path_buf(),
                    message: format!("Failed to create directory: {}", e),
                })?;
        }

        std::fs::write(path, config_str)
            .map_err(|e| ReconError::FileError {
                path: path.to_path_buf(),
                message: format!("Failed to write configuration: {}", e),
            })?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// API key configured for a service, if any
    pub fn api_key(&self, service: &str) -> Option<&str> {
        self.api_keys
            .get(service)
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolCategory;

    #[test]
    fn test_builtin_defaults_parse() {
        let config = Config::load(Some(Path::new("/nonexistent/recon-again.toml"))).unwrap();

        assert_eq!(config.tools.max_concurrent, 5);
        assert_eq!(config.tools.default_plan_size, 5);
        assert_eq!(config.synthesis.categories, vec![ToolCategory::Web]);
        assert_eq!(config.synthesis.max_items, 50);
        assert_eq!(config.global.session_cache_size, 64);
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tools]\nmax_concurrent = 2\n\n[api_keys]\nhunter = \"abc\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.tools.max_concurrent, 2);
        assert_eq!(config.tools.timeout_seconds, 300);
        assert_eq!(config.api_key("hunter"), Some("abc"));
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.tools.timeout_seconds = 42;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.tools.timeout_seconds, 42);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.tools.max_concurrent = 0;
        assert!(config.validate().is_err());
    }
}
