use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::ToolCategory;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    /// Service name -> API key, for tools that require authentication
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub db_path: PathBuf,
    /// Directory for JSON session backups; disabled when unset
    pub results_dir: Option<PathBuf>,
    pub user_agent: String,
    /// Completed sessions kept in memory; running sessions are never evicted
    pub session_cache_size: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/recon_again.db"),
            results_dir: Some(PathBuf::from("./results")),
            user_agent: format!("recon-again/{}", env!("CARGO_PKG_VERSION")),
            session_cache_size: 64,
        }
    }
}

/// Tool execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Hard deadline applied to every probe
    pub timeout_seconds: u64,
    /// Maximum number of probes in flight at once
    pub max_concurrent: usize,
    /// Size of the deterministic fallback plan
    pub default_plan_size: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            max_concurrent: 5,
            default_plan_size: 5,
        }
    }
}

/// Advisory collaborator (OpenRouter chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: "openai/gpt-4-turbo".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl AdvisorConfig {
    /// API key from the configuration, falling back to `OPENROUTER_API_KEY`
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Filtered synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Tool categories whose results feed the business profile
    pub categories: Vec<ToolCategory>,
    /// Cap applied to every array in the synthesis input
    pub max_items: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            categories: vec![ToolCategory::Web],
            max_items: 50,
        }
    }
}

/// Contact graph backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub enabled: bool,
    pub db_path: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: PathBuf::from("./data/contacts.db"),
        }
    }
}
