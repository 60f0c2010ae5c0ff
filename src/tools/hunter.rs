use std::collections::BTreeSet;
use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{endpoint, http_client};
use crate::config::Config;
use crate::core::{capture, domain_of, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
use crate::error::{ReconError, ReconResult};
use crate::utils::HttpClient;

/// Hunter.io domain search for published email addresses
pub struct HunterTool {
    metadata: ToolMetadata,
    api_key: String,
    http: HttpClient,
}

impl HunterTool {
    pub fn new(config: &Config) -> ReconResult<Self> {
        let api_key = config
            .api_key("hunter")
            .ok_or_else(|| ReconError::ConfigError("hunter requires api_keys.hunter".to_string()))?
            .to_string();

        Ok(Self {
            metadata: ToolMetadata::new(
                "hunter",
                "Find email addresses published for a domain via Hunter.io",
                ToolCategory::Email,
            )
            .with_auth(),
            api_key,
            http: http_client(config, 30)?,
        })
    }

    async fn collect(&self, target: &str) -> ReconResult<ToolOutput> {
        let domain = domain_of(target);
        let url = endpoint(
            "https://api.hunter.io/v2/domain-search",
            &[("domain", domain.as_str()), ("limit", "100"), ("api_key", self.api_key.as_str())],
        )?;

        let response = self.http.get_json(&url).await?;
        Ok(ToolOutput::new(parse_domain_search(&response)).meta("source", "hunter.io"))
    }
}

#[async_trait]
impl Tool for HunterTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn probe(&self, target: &str) -> ToolResult {
        capture(&self.metadata, target, self.collect(target)).await
    }
}

fn parse_domain_search(response: &Value) -> Value {
    let data = &response["data"];
    let entries = data["emails"].as_array().map(Vec::as_slice).unwrap_or_default();

    let mut emails = BTreeSet::new();
    let mut phones = BTreeSet::new();
    let mut people = Vec::new();

    for entry in entries {
        let Some(email) = entry["value"].as_str() else {
            continue;
        };
        emails.insert(email.to_string());

        if let Some(phone) = entry["phone_number"].as_str().filter(|p| !p.is_empty()) {
            phones.insert(phone.to_string());
        }

        people.push(json!({
            "email": email,
            "first_name": entry["first_name"],
            "last_name": entry["last_name"],
            "position": entry["position"],
            "confidence": entry["confidence"],
        }));
    }

    json!({
        "organization": data["organization"],
        "pattern": data["pattern"],
        "emails": emails,
        "phones": phones,
        "people": people,
        "count": emails.len(),
    })
}

pub fn create(config: &Config) -> ReconResult<Arc<dyn Tool>> {
    Ok(Arc::new(HunterTool::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let err = HunterTool::new(&Config::default()).err().unwrap();
        assert!(matches!(err, ReconError::ConfigError(_)));
    }

    #[test]
    fn test_parse_domain_search() {
        let response = json!({
            "data": {
                "organization": "Acme",
                "pattern": "{first}.{last}",
                "emails": [
                    {"value": "jane.doe@acme.example", "first_name": "Jane", "last_name": "Doe",
                     "position": "CTO", "confidence": 94, "phone_number": "+1 555 010 9999"},
                    {"value": "info@acme.example", "phone_number": null},
                    {"type": "generic"}
                ]
            }
        });

        let data = parse_domain_search(&response);

        assert_eq!(data["organization"], "Acme");
        assert_eq!(data["emails"], json!(["info@acme.example", "jane.doe@acme.example"]));
        assert_eq!(data["phones"], json!(["+1 555 010 9999"]));
        assert_eq!(data["people"][0]["email"], "jane.doe@acme.example");
        assert_eq!(data["count"], 2);
    }
}
