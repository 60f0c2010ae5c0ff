// src/engine/postprocess.rs
use std::collections::BTreeMap;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::advisor::Advisor;
use crate::config::SynthesisConfig;
use crate::core::{AiAnalysis, AnalysisOutcome, BusinessProfile, ToolRegistry, ToolResult};

const SCALAR_PREVIEW_CHARS: usize = 200;

/// How the synthesis stage ended. Only `Profile` is persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    /// No successful result belongs to a configured category
    Skipped,
    Unavailable,
    Failed(String),
    /// The advisor found nothing to infer
    Empty,
    Profile(BusinessProfile),
}

/// Condensed view of the successful results, keyed by tool
pub fn summarize_results(results: &BTreeMap<String, ToolResult>) -> Value {
    let mut summary = Map::new();

    for (name, result) in results.iter().filter(|(_, r)| r.success) {
        let line = match &result.data {
            Some(Value::Array(items)) => format!("Found {} items", items.len()),
            Some(Value::Object(fields)) => format!("Found {} keys", fields.len()),
            Some(other) => {
                let text = match other {
                    Value::String(s) => s.clone(),
                    _ => other.to_string(),
                };
                text.chars().take(SCALAR_PREVIEW_CHARS).collect()
            }
            None => "Completed".to_string(),
        };
        summary.insert(name.clone(), Value::String(line));
    }

    Value::Object(summary)
}

/// Cap every array in `value` to `max_items` elements, at any depth
pub fn trim_data(value: &Value, max_items: usize) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items.iter().take(max_items).map(|item| trim_data(item, max_items)).collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| (key.clone(), trim_data(item, max_items)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Global analysis and category-filtered synthesis over a finished fan-in
pub struct PostProcessor<'a> {
    advisor: Option<&'a dyn Advisor>,
    registry: &'a ToolRegistry,
    synthesis: &'a SynthesisConfig,
}

impl<'a> PostProcessor<'a> {
    pub fn new(advisor: Option<&'a dyn Advisor>, registry: &'a ToolRegistry, synthesis: &'a SynthesisConfig) -> Self {
        Self { advisor, registry, synthesis }
    }

    fn enabled_advisor(&self) -> Option<&'a dyn Advisor> {
        self.advisor.filter(|advisor| advisor.is_enabled())
    }

    /// Returns `None` when there are no results to analyze
    pub async fn analyze(&self, target: &str, results: &BTreeMap<String, ToolResult>) -> Option<AnalysisOutcome> {
        if results.is_empty() {
            debug!("No results for {}, skipping analysis", target);
            return None;
        }

        let Some(advisor) = self.enabled_advisor() else {
            info!("Advisor unavailable, analysis skipped for {}", target);
            return Some(AnalysisOutcome::Unavailable);
        };

        let summary = summarize_results(results);
        let outcome = match advisor.analyze(target, &summary).await {
            Ok(value) => match AiAnalysis::from_value(value) {
                Some(analysis) => AnalysisOutcome::Completed(analysis),
                None => AnalysisOutcome::Failed {
                    reason: "Advisor returned a non-object analysis".to_string(),
                },
            },
            Err(e) => {
                warn!("AI analysis failed for {}: {}", target, e);
                AnalysisOutcome::Failed { reason: e.to_string() }
            }
        };

        info!("AI analysis for {}: {}", target, outcome.status());
        Some(outcome)
    }

    /// Build a business profile from results whose tool category is configured
    pub async fn synthesize(&self, target: &str, results: &BTreeMap<String, ToolResult>) -> SynthesisOutcome {
        let mut source_tools = Vec::new();
        let mut records = Vec::new();

        for (name, result) in results {
            let Some(data) = result.data.as_ref().filter(|_| result.success) else {
                continue;
            };
            let eligible = self
                .registry
                .category_of(name)
                .map_or(false, |category| self.synthesis.categories.contains(&category));
            if !eligible {
                continue;
            }

            source_tools.push(name.clone());
            records.push(json!({
                "tool": name,
                "data": trim_data(data, self.synthesis.max_items),
            }));
        }

        if records.is_empty() {
            debug!("No eligible results for synthesis on {}", target);
            return SynthesisOutcome::Skipped;
        }

        let Some(advisor) = self.enabled_advisor() else {
            return SynthesisOutcome::Unavailable;
        };

        info!("Synthesizing business profile for {} from {:?}", target, source_tools);
        match advisor.synthesize(target, &Value::Array(records)).await {
            Ok(Some(value)) => match BusinessProfile::from_value(value, source_tools) {
                Some(profile) => SynthesisOutcome::Profile(profile),
                None => SynthesisOutcome::Failed("Advisor returned a non-object profile".to_string()),
            },
            Ok(None) => SynthesisOutcome::Empty,
            Err(e) => {
                warn!("Business profile synthesis failed for {}: {}", target, e);
                SynthesisOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use async_trait::async_trait;
    use crate::advisor::{AdvisorError, MockAdvisor};
    use crate::core::{Tool, ToolCategory, ToolMetadata};

    struct StubTool(ToolMetadata);

    #[async_trait]
    impl Tool for StubTool {
        fn metadata(&self) -> &ToolMetadata {
            &self.0
        }

        async fn probe(&self, target: &str) -> ToolResult {
            ToolResult::success(&self.0.name, target, json!({}))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::from_tools(vec![
            Arc::new(StubTool(ToolMetadata::new("crt_sh", "certs", ToolCategory::Dns))) as Arc<dyn Tool>,
            Arc::new(StubTool(ToolMetadata::new("corporate_site", "site", ToolCategory::Web))),
        ])
    }

    fn results() -> BTreeMap<String, ToolResult> {
        let mut results = BTreeMap::new();
        results.insert(
            "crt_sh".to_string(),
            ToolResult::success("crt_sh", "example.com", json!({"subdomains": ["a", "b"], "count": 2})),
        );
        results.insert(
            "corporate_site".to_string(),
            ToolResult::success("corporate_site", "example.com", json!({"emails": ["x@example.com"]})),
        );
        results.insert(
            "wayback".to_string(),
            ToolResult::failure("wayback", "example.com", "HTTP 500"),
        );
        results
    }

    #[test]
    fn test_summarize_results() {
        let mut results = results();
        results.insert("list".to_string(), ToolResult::success("list", "t", json!([1, 2, 3])));
        results.insert("text".to_string(), ToolResult::success("text", "t", json!("x".repeat(300))));
        let mut bare = ToolResult::success("bare", "t", json!(null));
        bare.data = None;
        results.insert("bare".to_string(), bare);

        let summary = summarize_results(&results);

        assert_eq!(summary["crt_sh"], "Found 2 keys");
        assert_eq!(summary["list"], "Found 3 items");
        assert_eq!(summary["text"].as_str().unwrap().len(), 200);
        assert_eq!(summary["bare"], "Completed");
        assert!(summary.get("wayback").is_none());
    }

    #[test]
    fn test_trim_data_caps_nested_arrays() {
        let data = json!({"z": [[1, 2, 3], [4], [5], [6]], "a": {"urls": [1, 2, 3, 4]}, "n": 7});

        let trimmed = trim_data(&data, 2);

        assert_eq!(trimmed, json!({"z": [[1, 2], [4]], "a": {"urls": [1, 2]}, "n": 7}));
        let keys: Vec<_> = trimmed.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "n"]);
    }

    #[tokio::test]
    async fn test_analysis_without_advisor_is_unavailable() {
        let registry = registry();
        let synthesis = SynthesisConfig::default();
        let post = PostProcessor::new(None, &registry, &synthesis);

        assert_eq!(post.analyze("example.com", &results()).await, Some(AnalysisOutcome::Unavailable));
        assert_eq!(post.analyze("example.com", &BTreeMap::new()).await, None);
    }

    #[tokio::test]
    async fn test_analysis_outcomes() {
        let registry = registry();
        let synthesis = SynthesisConfig::default();

        let mut advisor = MockAdvisor::new();
        advisor.expect_is_enabled().return_const(true);
        advisor
            .expect_analyze()
            .withf(|_, summary| summary.get("wayback").is_none() && summary.get("crt_sh").is_some())
            .times(1)
            .returning(|_, _| Ok(json!({"summary": "ok", "risk_level": "low"})));
        let outcome = PostProcessor::new(Some(&advisor), &registry, &synthesis)
            .analyze("example.com", &results())
            .await
            .unwrap();
        assert_eq!(outcome.status(), "completed");
        assert_eq!(outcome.analysis().unwrap().risk_level.as_deref(), Some("low"));

        let mut advisor = MockAdvisor::new();
        advisor.expect_is_enabled().return_const(true);
        advisor.expect_analyze().returning(|_, _| Ok(json!(["not", "an", "object"])));
        let outcome = PostProcessor::new(Some(&advisor), &registry, &synthesis)
            .analyze("example.com", &results())
            .await
            .unwrap();
        assert_eq!(outcome.status(), "failed");

        let mut advisor = MockAdvisor::new();
        advisor.expect_is_enabled().return_const(true);
        advisor
            .expect_analyze()
            .returning(|_, _| Err(AdvisorError::ApiError { status: 429, message: "rate limited".to_string() }));
        let outcome = PostProcessor::new(Some(&advisor), &registry, &synthesis)
            .analyze("example.com", &results())
            .await
            .unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Failed { reason } if reason.contains("429")));
    }

    #[tokio::test]
    async fn test_synthesis_uses_only_configured_categories() {
        let registry = registry();
        let synthesis = SynthesisConfig { categories: vec![ToolCategory::Web], max_items: 10 };

        let mut advisor = MockAdvisor::new();
        advisor.expect_is_enabled().return_const(true);
        advisor
            .expect_synthesize()
            .withf(|_, records| {
                let records = records.as_array().unwrap();
                records.len() == 1 && records[0]["tool"] == "corporate_site"
            })
            .times(1)
            .returning(|_, _| Ok(Some(json!({"industry": "Manufacturing", "locations": ["Lyon"]}))));

        let outcome = PostProcessor::new(Some(&advisor), &registry, &synthesis)
            .synthesize("example.com", &results())
            .await;

        let SynthesisOutcome::Profile(profile) = outcome else {
            panic!("expected a profile, got {:?}", outcome);
        };
        assert_eq!(profile.industry.as_deref(), Some("Manufacturing"));
        assert_eq!(profile.source_tools, vec!["corporate_site".to_string()]);
    }

    #[tokio::test]
    async fn test_synthesis_skipped_without_eligible_results() {
        let registry = registry();
        let synthesis = SynthesisConfig { categories: vec![ToolCategory::Cloud], max_items: 10 };

        let mut advisor = MockAdvisor::new();
        advisor.expect_is_enabled().return_const(true);
        advisor.expect_synthesize().never();

        let outcome = PostProcessor::new(Some(&advisor), &registry, &synthesis)
            .synthesize("example.com", &results())
            .await;

        assert_eq!(outcome, SynthesisOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_synthesis_empty_and_unavailable() {
        let registry = registry();
        let synthesis = SynthesisConfig::default();

        let mut advisor = MockAdvisor::new();
        advisor.expect_is_enabled().return_const(true);
        advisor.expect_synthesize().returning(|_, _| Ok(None));
        let outcome = PostProcessor::new(Some(&advisor), &registry, &synthesis)
            .synthesize("example.com", &results())
            .await;
        assert_eq!(outcome, SynthesisOutcome::Empty);

        let outcome = PostProcessor::new(None, &registry, &synthesis)
            .synthesize("example.com", &results())
            .await;
        assert_eq!(outcome, SynthesisOutcome::Unavailable);
    }
}
