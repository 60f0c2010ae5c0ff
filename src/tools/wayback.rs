use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{endpoint, http_client};
use crate::config::Config;
use crate::core::{capture, domain_of, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::{ReconError, ReconResult};
use crate::utils::HttpClient;

/// Historical URLs from the Wayback Machine CDX API
pub struct WaybackTool {
    metadata: ToolMetadata,
    http: HttpClient,
}

impl WaybackTool {
    pub fn new(config: &Config) -> ReconResult<Self> {
        Ok(Self {
            metadata: ToolMetadata::new(
                "wayback",
                "Extract historical URLs from Wayback Machine",
                ToolCategory::Web,
            ),
            http: http_client(config, 60)?,
        })
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let domain = domain_of(target);
        let pattern = format!("{}/*", domain);
        let url = endpoint(
            "https://web.archive.org/cdx/search/cdx",
            &[("url", pattern.as_str()), ("output", "json"), ("collapse", "urlkey")],
        )?;

        let rows = self.http.get_json(&url).await?;
        let urls = parse_cdx(&rows);

        if urls.is_empty() {
            return Err(ReconError::ToolError {
                tool: self.metadata.name.clone(),
                message: "No URLs found in Wayback Machine".to_string(),
            });
        }

        Ok(ToolOutput::new(json!({
            "urls": urls,
            "count": urls.len(),
        }))
        .meta("source", "wayback_machine"))
    }
}

#[async_trait]
impl Tool for WaybackTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

/// The CDX JSON output is a table whose first row is the header;
/// the original URL is the third column.
fn parse_cdx(rows: &Value) -> Vec<String> {
    rows.as_array()
        .map(|rows| {
            rows.iter()
                .skip(1)
                .filter_map(|row| row.get(2).and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(WaybackTool::new(config)?))
}
