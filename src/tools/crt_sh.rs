use std::collections::BTreeSet;
use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{endpoint, http_client};
use crate::config::Config;
use crate::core::{capture, domain_of, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::{ReconError, ReconResult};
use crate::utils::HttpClient;

/// Subdomains from certificate transparency logs
pub struct CrtShTool {
    metadata: ToolMetadata,
    http: HttpClient,
}

impl CrtShTool {
    pub fn new(config: &Config) -> ReconResult<Self> {
        Ok(Self {
            metadata: ToolMetadata::new(
                "crt_sh",
                "Query certificate transparency logs for subdomains",
                ToolCategory::Dns,
            ),
            http: http_client(config, 30)?,
        })
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let domain = domain_of(target);
        let query = format!("%.{}", domain);
        let url = endpoint("https://crt.sh/", &[("q", query.as_str()), ("output", "json")])?;

        let certificates = self.http.get_json(&url).await?;
        let entries = certificates
            .as_array()
            .ok_or_else(|| ReconError::NetworkError("crt.sh returned a non-array payload".to_string()))?;

        let subdomains = parse_certificates(&domain, entries);
        debug!("crt.sh: {} certificates, {} subdomains for {}", entries.len(), subdomains.len(), domain);

        Ok(ToolOutput::new(json!({
            "subdomains": subdomains,
            "count": subdomains.len(),
        }))
        .meta("source", "crt.sh")
        .meta("certificates_found", entries.len()))
    }
}

#[async_trait]
impl Tool for CrtShTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

/// Unique, sorted names under `domain` from the `name_value` fields
fn parse_certificates(domain: &str, entries: &[Value]) -> Vec<String> {
    let mut names = BTreeSet::new();

    for entry in entries {
        let Some(name_value) = entry.get("name_value").and_then(Value::as_str) else {
            continue;
        };

        for name in name_value.split(|c| c == '\n' || c == ',') {
            let name = name.trim().to_lowercase();
            if name.is_empty() || !name.contains(domain) {
                continue;
            }
            let name = name.replace("*.", "");
            let name = name.trim_start_matches('.');
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
    }

    names.into_iter().collect()
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(CrtShTool::new(config)?))
}
