// src/core/analysis.rs
use serde::{Serialize, Deserialize};
use serde_json::Value;

/// Structured result of the global analysis stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AiAnalysis {
    pub summary: Option<String>,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub risk_level: Option<String>,
    pub interesting_targets: Vec<String>,
    /// Full payload as returned by the advisor
    pub raw: Value,
}

impl AiAnalysis {
    /// Interpret an advisor payload; only JSON objects are accepted
    pub fn from_value(value: Value) -> Option<Self> {
        let object = value.as_object()?;

        Some(Self {
            summary: text_field(object.get("summary")),
            key_findings: string_list(object.get("key_findings")),
            recommendations: string_list(object.get("recommendations")),
            risk_level: text_field(object.get("risk_level")),
            interesting_targets: string_list(object.get("interesting_targets")),
            raw: value.clone(),
        })
    }
}

/// Terminal state of the global analysis stage. Every variant is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Completed(AiAnalysis),
    /// No advisor configured, or the advisor is disabled
    Unavailable,
    /// Advisor call failed or returned something that is not a JSON object
    Failed { reason: String },
}

impl AnalysisOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            AnalysisOutcome::Completed(_) => "completed",
            AnalysisOutcome::Unavailable => "unavailable",
            AnalysisOutcome::Failed { .. } => "failed",
        }
    }

    pub fn analysis(&self) -> Option<&AiAnalysis> {
        match self {
            AnalysisOutcome::Completed(analysis) => Some(analysis),
            _ => None,
        }
    }
}

/// Business profile derived from the filtered synthesis stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BusinessProfile {
    pub business_size: Option<String>,
    pub incorporation_date: Option<String>,
    pub locations: Vec<String>,
    pub industry: Option<String>,
    pub other_insights: Vec<String>,
    /// Tools whose results were fed into the synthesis
    pub source_tools: Vec<String>,
    pub raw: Value,
}

impl BusinessProfile {
    /// Interpret an advisor payload, defaulting absent keys to null/empty
    pub fn from_value(value: Value, source_tools: Vec<String>) -> Option<Self> {
        let object = value.as_object()?;

        Some(Self {
            business_size: text_field(object.get("business_size")),
            incorporation_date: text_field(object.get("incorporation_date")),
            locations: string_list(object.get("locations")),
            industry: text_field(object.get("industry")),
            other_insights: string_list(object.get("other_insights")),
            source_tools,
            raw: value.clone(),
        })
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analysis_from_object() {
        let analysis = AiAnalysis::from_value(json!({
            "summary": "Small footprint",
            "key_findings": ["3 subdomains"],
            "risk_level": "low",
            "interesting_targets": ["dev.example.com", null]
        })).unwrap();

        assert_eq!(analysis.summary.as_deref(), Some("Small footprint"));
        assert_eq!(analysis.key_findings, vec!["3 subdomains"]);
        assert!(analysis.recommendations.is_empty());
        assert_eq!(analysis.interesting_targets, vec!["dev.example.com"]);
    }

    #[test]
    fn test_analysis_rejects_non_object() {
        assert!(AiAnalysis::from_value(json!(["not", "an", "object"])).is_none());
    }

    #[test]
    fn test_profile_defaults_missing_keys() {
        let profile = BusinessProfile::from_value(
            json!({"industry": "Logistics", "incorporation_date": 1999}),
            vec!["corporate_site".to_string()],
        ).unwrap();

        assert_eq!(profile.industry.as_deref(), Some("Logistics"));
        assert_eq!(profile.incorporation_date.as_deref(), Some("1999"));
        assert!(profile.business_size.is_none());
        assert!(profile.locations.is_empty());
        assert_eq!(profile.source_tools, vec!["corporate_site"]);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(AnalysisOutcome::Failed { reason: "bad json".into() }).unwrap();
        assert_eq!(value, json!({"status": "failed", "reason": "bad json"}));

        let value = serde_json::to_value(AnalysisOutcome::Unavailable).unwrap();
        assert_eq!(value, json!({"status": "unavailable"}));
    }
}
