// src/core/registry.rs
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn, debug};

use crate::config::Config;
use crate::error::ReconResult;
use super::tool::{Tool, ToolCategory, ToolMetadata};

/// Builds one tool from the configuration; may fail (missing key, bad setting)
pub type ToolConstructor = Box<dyn Fn(&Config) -> ReconResult<Arc<dyn Tool>> + Send + Sync>;

/// One slot of the ordered tool catalog
pub struct CatalogEntry {
    pub name: &'static str,
    pub build: ToolConstructor,
}

impl CatalogEntry {
    pub fn new<F>(name: &'static str, build: F) -> Self
    where
        F: Fn(&Config) -> ReconResult<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        Self { name, build: Box::new(build) }
    }
}

/// Read-only set of live tools, in catalog order
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build the registry from an ordered catalog. A constructor that fails
    /// is logged and skipped; the rest still register.
    pub fn from_catalog(config: &Config, catalog: Vec<CatalogEntry>) -> Self {
        let mut registry = Self::empty();

        for entry in catalog {
            match (entry.build)(config) {
                Ok(tool) => registry.insert(tool),
                Err(e) => warn!("Failed to register tool '{}': {}", entry.name, e),
            }
        }

        info!("Tool registry built with {} tools", registry.len());
        registry
    }

    /// Build the registry from already-constructed tools
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::empty();
        for tool in tools {
            registry.insert(tool);
        }
        registry
    }

    fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.metadata().name.clone();

        if self.index.contains_key(&name) {
            warn!("Tool '{}' is already registered, keeping the first instance", name);
            return;
        }

        debug!("Registered tool: {}", name);
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
    }

    /// Tool names in registration order
    pub fn list(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.metadata().name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn info(&self, name: &str) -> Option<ToolMetadata> {
        self.index.get(name).map(|&i| self.tools[i].metadata().clone())
    }

    pub fn category_of(&self, name: &str) -> Option<ToolCategory> {
        self.index.get(name).map(|&i| self.tools[i].metadata().category)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use crate::core::tool::ToolResult;
    use crate::error::ReconError;

    struct StaticTool {
        metadata: ToolMetadata,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn metadata(&self) -> &ToolMetadata {
            &self.metadata
        }

        async fn probe(&self, target: &str) -> ToolResult {
            ToolResult::success(&self.metadata.name, target, json!({}))
        }
    }

    fn entry(name: &'static str, category: ToolCategory) -> CatalogEntry {
        CatalogEntry::new(name, move |_config: &Config| {
            Ok(Arc::new(StaticTool {
                metadata: ToolMetadata::new(name, "static", category),
            }) as Arc<dyn Tool>)
        })
    }

    #[test]
    fn test_failing_constructor_is_skipped() {
        let catalog = vec![
            entry("alpha", ToolCategory::Dns),
            CatalogEntry::new("broken", |_config: &Config| {
                Err(ReconError::ToolError {
                    tool: "broken".to_string(),
                    message: "missing API key".to_string(),
                })
            }),
            entry("gamma", ToolCategory::Web),
        ];

        let registry = ToolRegistry::from_catalog(&Config::default(), catalog);

        assert_eq!(registry.list(), vec!["alpha", "gamma"]);
        assert!(registry.get("broken").is_none());
        assert!(registry.info("broken").is_none());
    }

    #[test]
    fn test_catalog_order_is_preserved() {
        let catalog = vec![
            entry("zeta", ToolCategory::Dns),
            entry("alpha", ToolCategory::Dns),
            entry("mu", ToolCategory::Cloud),
        ];

        let registry = ToolRegistry::from_catalog(&Config::default(), catalog);

        assert_eq!(registry.list(), vec!["zeta", "alpha", "mu"]);
    }

    #[test]
    fn test_info_and_category() {
        let registry = ToolRegistry::from_catalog(
            &Config::default(),
            vec![entry("urlscan", ToolCategory::Web)],
        );

        let info = registry.info("urlscan").unwrap();
        assert_eq!(info.name, "urlscan");
        assert_eq!(info.category, ToolCategory::Web);
        assert!(!info.requires_auth);
        assert_eq!(registry.category_of("urlscan"), Some(ToolCategory::Web));
        assert!(registry.contains("urlscan"));
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let registry = ToolRegistry::from_catalog(
            &Config::default(),
            vec![entry("dup", ToolCategory::Dns), entry("dup", ToolCategory::Web)],
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.category_of("dup"), Some(ToolCategory::Dns));
    }
}
