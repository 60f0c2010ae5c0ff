// src/core/tool.rs
use std::fmt;
use std::future::Future;
use std::time::Instant;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ReconResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Dns,
    Web,
    Cloud,
    Email,
    Osint,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Dns => "dns",
            ToolCategory::Web => "web",
            ToolCategory::Cloud => "cloud",
            ToolCategory::Email => "email",
            ToolCategory::Osint => "osint",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a tool, as reported by `ReconEngine::get_tool_info`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub requires_auth: bool,
}

impl ToolMetadata {
    pub fn new(name: &str, description: &str, category: ToolCategory) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category,
            requires_auth: false,
        }
    }

    pub fn with_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }
}

/// Uniform envelope returned by every probe.
///
/// `error` is set exactly when `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_name: String,
    pub target: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    /// Seconds
    pub execution_time: f64,
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    pub fn success(tool_name: &str, target: &str, data: Value) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            target: target.to_string(),
            success: true,
            data: Some(data),
            error: None,
            execution_time: 0.0,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(tool_name: &str, target: &str, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            target: target.to_string(),
            success: false,
            data: None,
            error: Some(error.into()),
            execution_time: 0.0,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_execution_time(mut self, seconds: f64) -> Self {
        self.execution_time = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Repair an envelope coming back from an arbitrary tool so it honours
    /// the contract: registered name, `error` present iff failed, time >= 0.
    pub fn normalized(mut self, tool_name: &str) -> Self {
        if self.tool_name != tool_name {
            debug!("Tool '{}' reported name '{}', using registered name", tool_name, self.tool_name);
            self.tool_name = tool_name.to_string();
        }
        if self.success {
            self.error = None;
        } else if self.error.as_deref().map_or(true, |e| e.trim().is_empty()) {
            self.error = Some("Tool reported failure without an error message".to_string());
        }
        let seconds = self.execution_time;
        self.with_execution_time(seconds)
    }
}

/// Successful payload produced by a tool's internal collection step
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub data: Value,
    pub metadata: Map<String, Value>,
}

impl ToolOutput {
    pub fn new(data: Value) -> Self {
        Self { data, metadata: Map::new() }
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Capability every reconnaissance tool implements.
///
/// `probe` never fails: any internal fault is reported as a `ToolResult`
/// with `success == false`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description, category and auth requirement
    fn metadata(&self) -> &ToolMetadata;

    /// Run the tool against a target
    async fn probe(&self, target: &str) -> ToolResult;
}

/// Run a fallible collection step and fold its outcome into a `ToolResult`,
/// timing it along the way. Adapters build their `probe` on top of this.
pub async fn capture<F>(metadata: &ToolMetadata, target: &str, collect: F) -> ToolResult
where
    F: Future<Output = ReconResult<ToolOutput>>,
{
    let start_time = Instant::now();
    let outcome = collect.await;
    let elapsed = start_time.elapsed().as_secs_f64();

    match outcome {
        Ok(output) => ToolResult::success(&metadata.name, target, output.data)
            .with_metadata(output.metadata)
            .with_execution_time(elapsed),
        Err(e) => {
            warn!("Tool '{}' failed on {}: {}", metadata.name, target, e);
            ToolResult::failure(&metadata.name, target, e.to_string())
                .with_execution_time(elapsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconError;
    use serde_json::json;

    fn meta() -> ToolMetadata {
        ToolMetadata::new("crt_sh", "certificate transparency", ToolCategory::Dns)
    }

    #[tokio::test]
    async fn test_capture_success() {
        let result = capture(&meta(), "example.com", async {
            Ok(ToolOutput::new(json!({"subdomains": ["a.example.com"]})).meta("source", "crt.sh"))
        }).await;

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.tool_name, "crt_sh");
        assert_eq!(result.metadata["source"], "crt.sh");
        assert!(result.execution_time >= 0.0);
    }

    #[tokio::test]
    async fn test_capture_converts_error() {
        let result = capture(&meta(), "example.com", async {
            Err(ReconError::NetworkError("HTTP 500".to_string()))
        }).await;

        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error.as_deref(), Some("Network error: HTTP 500"));
    }

    #[test]
    fn test_normalized_fills_missing_error() {
        let mut result = ToolResult::success("other", "example.com", json!({}));
        result.success = false;
        result.execution_time = -3.0;

        let result = result.normalized("crt_sh");

        assert_eq!(result.tool_name, "crt_sh");
        assert!(result.error.is_some());
        assert_eq!(result.execution_time, 0.0);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ToolCategory::Web).unwrap(), json!("web"));
        let parsed: ToolCategory = serde_json::from_value(json!("cloud")).unwrap();
        assert_eq!(parsed, ToolCategory::Cloud);
    }
}
