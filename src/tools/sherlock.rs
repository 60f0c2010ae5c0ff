use std::path::PathBuf;
use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::core::{capture, TargetType, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::{ReconError, ReconResult};
use crate::utils::shell;

/// Username enumeration across social platforms through the `sherlock` binary
pub struct SherlockTool {
    metadata: ToolMetadata,
    timeout_secs: u64,
}

impl SherlockTool {
    pub fn new(config: &Config) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "sherlock",
                "Username enumeration across social media platforms using Sherlock",
                ToolCategory::Osint,
            ),
            timeout_secs: config.tools.timeout_seconds,
        }
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let username = target.trim().trim_start_matches('@');
        if TargetType::detect(username) != TargetType::Username {
            return Err(ReconError::InvalidInput(format!("sherlock expects a username, got '{}'", target)));
        }

        if !shell::is_installed("sherlock", "--version").await {
            return Err(ReconError::ExternalToolError {
                tool: self.metadata.name.clone(),
                message: "Sherlock not installed. Install from: https://github.com/sherlock-project/sherlock".to_string(),
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
            "sherlock",
            &["--print-found", "--no-color", "--timeout", "10", "--output", output_path, username],
            self.timeout_secs,
        )
        .await
        .map_err(|e| ReconError::ExternalToolError {
            tool: self.metadata.name.clone(),
            message: format!("Command execution failed: {:#}", e),
        })?;

        let content = match tokio::fs::read_to_string(output_path).await {
            Ok(content) if !content.trim().is_empty() => content,
            _ => String::from_utf8_lossy(&output.stdout).into_owned(),
        };

        let accounts = parse_accounts(&content);
        debug!("sherlock found {} accounts for {}", accounts.len(), username);

        if accounts.is_empty() {
            return Err(ReconError::ToolError {
                tool: self.metadata.name.clone(),
                message: "No accounts found or tool execution failed".to_string(),
            });
        }

        Ok(ToolOutput::new(json!({
            "username": username,
            "accounts": accounts,
            "count": accounts.len(),
        }))
        .meta("source", "sherlock"))
    }
}

#[async_trait]
impl Tool for SherlockTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

/// Profile URLs from Sherlock's report or `--print-found` output.
/// Lines look like `https://github.com/alice` or `[+] GitHub: https://github.com/alice`.
fn parse_accounts(content: &str) -> Vec<Value> {
    let mut seen = std::collections::BTreeSet::new();

    content
        .lines()
        .filter_map(|line| {
            let start = line.find("http")?;
            let url = line[start..].trim();
            let parsed = Url::parse(url).ok()?;
            let site = parsed.host_str()?.trim_start_matches("www.").to_string();
            seen.insert(url.to_string()).then(|| json!({"site": site, "url": url}))
        })
        .collect()
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(SherlockTool::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accounts() {
        let content = "\
[*] Checking username alice on:
[+] GitHub: https://github.com/alice
[+] Reddit: https://www.reddit.com/user/alice
https://github.com/alice
[*] Search completed with 2 results
Total Websites Username Detected On : 2
";

        let accounts = parse_accounts(content);

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0], json!({"site": "github.com", "url": "https://github.com/alice"}));
        assert_eq!(accounts[1]["site"], "reddit.com");
    }

    #[tokio::test]
    async fn test_rejects_non_username_targets() {
        let tool = SherlockTool::new(&Config::default());

        let result = tool.probe("example.com").await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("expects a username"));
    }
}
