use std::collections::BTreeSet;
use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{endpoint, http_client};
use crate::config::Config;
use crate::core::{capture, domain_of, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::ReconResult;
use crate::utils::HttpClient;

pub struct UrlscanTool {
    metadata: ToolMetadata,
    http: HttpClient,
}

impl UrlscanTool {
    pub fn new(config: &Config) -> ReconResult<Self> {
        Ok(Self {
            metadata: ToolMetadata::new(
                "urlscan",
                "Search urlscan.io for historical scans and related domains",
                ToolCategory::Web,
            ),
            http: http_client(config, 30)?,
        })
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let domain = domain_of(target);
        let query = format!("domain:{}", domain);
        let url = endpoint("https://urlscan.io/api/v1/search/", &[("q", query.as_str()), ("size", "100")])?;

        let response = self.http.get_json(&url).await?;
        Ok(ToolOutput::new(parse_search(&response)).meta("source", "urlscan.io"))
    }
}

#[async_trait]
impl Tool for UrlscanTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

fn parse_search(response: &Value) -> Value {
    let results = response
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut domains = BTreeSet::new();
    let mut urls = BTreeSet::new();

    for result in results {
        let page = &result["page"];
        if let Some(domain) = page["domain"].as_str().filter(|d| !d.is_empty()) {
            domains.insert(domain.to_string());
        }
        if let Some(url) = page["url"].as_str().filter(|u| !u.is_empty()) {
            urls.insert(url.to_string());
        }
    }

    json!({
        "domains": domains,
        "urls": urls,
        "scan_count": results.len(),
    })
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(UrlscanTool::new(config)?))
}
