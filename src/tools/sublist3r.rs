use std::path::PathBuf;
use std::sync::Arc;
use async_trait::async_trait;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::{debug, error};

use crate::config::Config;
use crate::core::{capture, domain_of, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::{ReconError, ReconResult};
use crate::utils::shell;

/// Subdomain enumeration through the external `sublist3r` binary
pub struct Sublist3rTool {
    metadata: ToolMetadata,
    timeout_secs: u64,
}

impl Sublist3rTool {
    pub fn new(config: &Config) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "sublist3r",
                "Subdomain enumeration using Sublist3r",
                ToolCategory::Dns,
            ),
            timeout_secs: config.tools.timeout_seconds,
        }
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let domain = domain_of(target);

        if !shell::is_installed("sublist3r", "--help").await {
            return Err(ReconError::ExternalToolError {
                tool: self.metadata.name.clone(),
                message: "Sublist3r not installed. Install with: pip install sublist3r".to_string(),
            });
        }

        let output_file = NamedTempFile::new()
            .map_err(|e| ReconError::FileError {
                path: PathBuf::from("temp"),
                message: format!("Failed to create temporary file: {}", e),
            })?;

        let output_path = output_file.path().to_str()
            .ok_or_else(|| ReconError::UnexpectedError("Failed to convert path to string".to_string()))?;

        let output = shell::execute_with_timeout(
            "sublist3r",
            &["-d", domain.as_str(), "-o", output_path, "-t", "10"],
            self.timeout_secs,
        )
        .await
        .map_err(|e| ReconError::ExternalToolError {
            tool: self.metadata.name.clone(),
            message: format!("Command execution failed: {:#}", e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Sublist3r failed: {}", stderr);
            return Err(ReconError::ExternalToolError {
                tool: self.metadata.name.clone(),
                message: format!("Tool failed: {}", stderr.trim()),
            });
        }

        let content = tokio::fs::read_to_string(output_path).await
            .map_err(|e| ReconError::FileError {
                path: PathBuf::from(output_path),
                message: format!("Failed to read output: {}", e),
            })?;

        let subdomains = parse_output(&content);
        debug!("Found {} subdomains with sublist3r", subdomains.len());

        Ok(ToolOutput::new(json!({
            "subdomains": subdomains,
            "count": subdomains.len(),
        }))
        .meta("source", "sublist3r"))
    }
}

#[async_trait]
impl Tool for Sublist3rTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

fn parse_output(content: &str) -> Vec<String> {
    let mut subdomains: Vec<String> = content
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect();
    subdomains.sort();
    subdomains.dedup();
    subdomains
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(Sublist3rTool::new(config)))
}
