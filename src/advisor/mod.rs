//! Advisory collaborator: a language-model client whose answers are hints.
//!
//! Callers validate everything that comes back: plans are filtered against the
//! registry, analysis payloads must be JSON objects, and any failure degrades
//! to a fallback instead of aborting the run.

mod error;
mod openrouter;

use async_trait::async_trait;
use serde_json::Value;

pub use error::AdvisorError;
pub use openrouter::{extract_json, OpenRouterAdvisor};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Advisor: Send + Sync {
    /// False when the advisor has no credentials and will refuse every call
    fn is_enabled(&self) -> bool;

    /// Ordered tool names to run against `target`, chosen from `available_tools`
    async fn plan(&self, target: &str, available_tools: &[String]) -> Result<Vec<String>, AdvisorError>;

    /// Free-form structured analysis of a summary of all results
    async fn analyze(&self, target: &str, results_summary: &Value) -> Result<Value, AdvisorError>;

    /// Business profile inferred from the filtered records, if any can be inferred
    async fn synthesize(&self, target: &str, records: &Value) -> Result<Option<Value>, AdvisorError>;
}
