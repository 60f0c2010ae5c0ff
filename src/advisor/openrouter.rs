//! OpenRouter chat-completions client implementing [`Advisor`]

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{Advisor, AdvisorError};
use crate::config::AdvisorConfig;

const PLAN_SYSTEM_PROMPT: &str =
    "You are a cybersecurity expert specializing in reconnaissance. Provide concise, actionable tool execution plans.";
const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a cybersecurity analyst. Analyze reconnaissance data and provide actionable insights in structured JSON format.";
const PROFILE_SYSTEM_PROMPT: &str =
    "You are a precise business analyst. Respond with compact JSON only.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenRouterAdvisor {
    api_key: Option<String>,
    model: String,
    base_url: String,
    http: Client,
}

impl OpenRouterAdvisor {
    pub fn from_config(config: &AdvisorConfig, user_agent: &str) -> Result<Self, AdvisorError> {
        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            warn!("Advisor initialized without API key - AI features disabled");
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn complete(
        &self,
        system: &str,
        prompt: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, AdvisorError> {
        let api_key = self.api_key.as_deref().ok_or(AdvisorError::Disabled)?;

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        debug!(model = %self.model, "Sending chat completion request");

        let response = self.http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("HTTP-Referer", "https://github.com/recon-again/recon-again")
            .header("X-Title", "recon-again")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AdvisorError::ApiError {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AdvisorError::InvalidResponse("response contained no message content".to_string()))
    }
}

#[async_trait]
impl Advisor for OpenRouterAdvisor {
    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn plan(&self, target: &str, available_tools: &[String]) -> Result<Vec<String>, AdvisorError> {
        let prompt = format!(
            "You are an expert penetration tester planning reconnaissance for target: {target}\n\n\
             Available tools: {tools}\n\n\
             Create an optimal execution plan. Consider:\n\
             1. Start with passive, non-intrusive tools (APIs, DNS lookups)\n\
             2. Then move to active enumeration (subdomain discovery, port scanning)\n\
             3. Finally, deep analysis tools (vulnerability scanning, content discovery)\n\n\
             Respond with ONLY a JSON array of tool names in execution order, no other text.\n\
             Example: [\"crt_sh\", \"urlscan\", \"sublist3r\"]",
            tools = available_tools.join(", "),
        );

        let response = self.complete(PLAN_SYSTEM_PROMPT, prompt, 0.3, 2000).await?;
        let plan = parse_plan(&response)?;
        info!("Advisor proposed {} tools", plan.len());
        Ok(plan)
    }

    async fn analyze(&self, target: &str, results_summary: &Value) -> Result<Value, AdvisorError> {
        let prompt = format!(
            "Analyze reconnaissance results for target: {target}\n\n\
             Results summary:\n{summary}\n\n\
             Provide analysis in JSON format with:\n\
             1. \"summary\": Brief overview of findings\n\
             2. \"key_findings\": Array of important discoveries\n\
             3. \"recommendations\": Array of next steps or tools to run\n\
             4. \"risk_level\": \"low\", \"medium\", \"high\", or \"critical\"\n\
             5. \"interesting_targets\": Array of subdomains/IPs worth investigating\n\n\
             Respond with ONLY valid JSON, no markdown or code blocks.",
            summary = serde_json::to_string_pretty(results_summary)?,
        );

        let response = self.complete(ANALYSIS_SYSTEM_PROMPT, prompt, 0.5, 2000).await?;
        Ok(serde_json::from_str(extract_json(&response))?)
    }

    async fn synthesize(&self, target: &str, records: &Value) -> Result<Option<Value>, AdvisorError> {
        let prompt = format!(
            "You are a business intelligence analyst. Using the scraped website data below, \
             infer structured business details for {target}.\n\
             Focus on:\n\
             - \"business_size\": approximate employee count band or revenue band.\n\
             - \"incorporation_date\": earliest year or precise incorporation/formation date if visible.\n\
             - \"locations\": list of headquarters/offices/regions mentioned.\n\
             - \"industry\": concise description of what the business does.\n\
             - \"other_insights\": list up to 5 notable facts.\n\n\
             Scraper data:\n{records}\n\n\
             Respond with ONLY valid JSON using these keys. Use null or empty arrays when unknown.",
            records = serde_json::to_string_pretty(records)?,
        );

        let response = self.complete(PROFILE_SYSTEM_PROMPT, prompt, 0.2, 800).await?;
        let value: Value = serde_json::from_str(extract_json(&response))?;

        if value.is_object() {
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }
}

/// Strip a Markdown code fence (optionally tagged `json`) around a payload
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        let inner = rest.split("```").next().unwrap_or(rest);
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        return inner.trim();
    }

    trimmed
}

fn parse_plan(response: &str) -> Result<Vec<String>, AdvisorError> {
    let value: Value = serde_json::from_str(extract_json(response))?;

    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()),
        other => Err(AdvisorError::InvalidResponse(format!("expected a JSON array, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json("  [\"crt_sh\"]\n"), "[\"crt_sh\"]");
    }

    #[test]
    fn test_extract_json_fenced() {
        let response = "```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(extract_json(response), "{\"summary\": \"ok\"}");

        let response = "```\n[1, 2]\n```\ntrailing prose";
        assert_eq!(extract_json(response), "[1, 2]");
    }

    #[test]
    fn test_parse_plan_keeps_strings_only() {
        let plan = parse_plan("```json\n[\"crt_sh\", 7, \"urlscan\"]\n```").unwrap();
        assert_eq!(plan, vec!["crt_sh", "urlscan"]);
    }

    #[test]
    fn test_parse_plan_rejects_objects() {
        assert!(matches!(parse_plan("{\"plan\": []}"), Err(AdvisorError::InvalidResponse(_))));
        assert!(matches!(parse_plan("not json"), Err(AdvisorError::Json(_))));
    }

    #[tokio::test]
    async fn test_disabled_without_key() {
        let config = AdvisorConfig {
            api_key: Some("   ".to_string()),
            ..AdvisorConfig::default()
        };
        std::env::remove_var("OPENROUTER_API_KEY");

        let advisor = OpenRouterAdvisor::from_config(&config, "recon-again/test").unwrap();

        assert!(!advisor.is_enabled());
        let err = advisor.plan("example.com", &["crt_sh".to_string()]).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
