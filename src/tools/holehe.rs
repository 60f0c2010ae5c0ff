use std::sync::Arc;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::core::{capture, TargetType, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::{ReconError, ReconResult};
use crate::utils::shell;

/// Checks which online services have an account registered to an email,
/// through the `holehe` binary
pub struct HoleheTool {
    metadata: ToolMetadata,
    timeout_secs: u64,
}

impl HoleheTool {
    pub fn new(config: &Config) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "holehe",
                "Find services an email address is registered on using Holehe",
                ToolCategory::Email,
            ),
            timeout_secs: config.tools.timeout_seconds,
        }
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let email = target.trim().to_lowercase();
        if TargetType::detect(&email) != TargetType::Email {
            return Err(ReconError::InvalidInput(format!("holehe expects an email address, got '{}'", target)));
        }

        if !shell::is_installed("holehe", "--help").await {
            return Err(ReconError::ExternalToolError {
                tool: self.metadata.name.clone(),
                message: "Holehe not installed. Install with: pip install holehe".to_string(),
            });
        }

        let output = shell::execute_with_timeout(
            "holehe",
            &["--only-used", "--no-color", "--no-clear", email.as_str()],
            self.timeout_secs,
        )
        .await
        .map_err(|e| ReconError::ExternalToolError {
            tool: self.metadata.name.clone(),
            message: format!("Command execution failed: {:#}", e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReconError::ExternalToolError {
                tool: self.metadata.name.clone(),
                message: format!("Tool failed: {}", stderr.trim()),
            });
        }

        let services = parse_registered(&String::from_utf8_lossy(&output.stdout));
        debug!("holehe found {} registered services for {}", services.len(), email);

        Ok(ToolOutput::new(json!({
            "email": email,
            "registered_on": services,
            "count": services.len(),
        }))
        .meta("source", "holehe"))
    }
}

#[async_trait]
impl Tool for HoleheTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

/// Services flagged `[+]` in Holehe's report
fn parse_registered(stdout: &str) -> Vec<String> {
    let mut services: Vec<String> = stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("[+]"))
        .map(|rest| rest.trim().to_lowercase())
        .filter(|service| !service.is_empty() && !service.contains(' '))
        .collect();
    services.sort();
    services.dedup();
    services
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(HoleheTool::new(config)))
}
