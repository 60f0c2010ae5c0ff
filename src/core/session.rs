// src/core/session.rs
use std::collections::BTreeMap;
use std::fmt;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use tracing::warn;
use uuid::Uuid;

use super::analysis::{AnalysisOutcome, BusinessProfile};
use super::target::{sanitize, TargetType};
use super::tool::ToolResult;
use crate::error::ReconResult;

/// Lifecycle of a session; only `Running -> Completed` is allowed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool result that could not be written to storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteFailure {
    pub tool_name: String,
    pub error: String,
}

/// One reconnaissance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub target: String,
    pub target_type: TargetType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    /// Tools attempted, in completion order
    pub tools_executed: Vec<String>,
    pub results: BTreeMap<String, ToolResult>,
    pub ai_analysis: Option<AnalysisOutcome>,
    pub business_profile: Option<BusinessProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_failures: Vec<WriteFailure>,
}

impl Session {
    /// Start a new session in the `running` state
    pub fn start(target: &str) -> Self {
        let start_time = Utc::now();
        Self {
            session_id: Self::generate_id(target, start_time),
            target: target.to_string(),
            target_type: TargetType::detect(target),
            start_time,
            end_time: None,
            status: SessionStatus::Running,
            tools_executed: Vec::new(),
            results: BTreeMap::new(),
            ai_analysis: None,
            business_profile: None,
            write_failures: Vec::new(),
        }
    }

    /// `<target>_<YYYYmmdd_HHMMSS>_<suffix>`; the random suffix keeps two runs
    /// started within the same second apart.
    pub fn generate_id(target: &str, start_time: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}",
            sanitize(target),
            start_time.format("%Y%m%d_%H%M%S"),
            &suffix[..8]
        )
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

/// Mutable record of one run, shared between concurrently completing probes
/// and readers polling for status. Readers always get a full snapshot.
pub struct SessionAggregator {
    state: RwLock<Session>,
}

impl SessionAggregator {
    pub fn new(session: Session) -> Self {
        Self { state: RwLock::new(session) }
    }

    pub fn session_id(&self) -> String {
        self.state.read().session_id.clone()
    }

    /// Store a completed tool's result. Each tool is recorded at most once;
    /// returns false if the name was already present.
    pub fn record(&self, result: ToolResult) -> bool {
        self.record_with(result, |_| Ok(())).unwrap_or(false)
    }

    /// Run `persist` and record the result under one write lock, so results
    /// appear in `tools_executed` in the order they were persisted. Nothing is
    /// recorded when `persist` fails.
    pub fn record_with<F>(&self, result: ToolResult, persist: F) -> ReconResult<bool>
    where
        F: FnOnce(&ToolResult) -> ReconResult<()>,
    {
        let mut session = self.state.write();

        if session.results.contains_key(&result.tool_name) {
            warn!("Ignoring second result for tool '{}' in session {}", result.tool_name, session.session_id);
            return Ok(false);
        }

        persist(&result)?;

        session.tools_executed.push(result.tool_name.clone());
        session.results.insert(result.tool_name.clone(), result);
        Ok(true)
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.state.read().results.contains_key(tool_name)
    }

    pub fn record_write_failure(&self, tool_name: &str, error: String) {
        self.state.write().write_failures.push(WriteFailure {
            tool_name: tool_name.to_string(),
            error,
        });
    }

    pub fn attach_analysis(&self, outcome: AnalysisOutcome) {
        self.state.write().ai_analysis = Some(outcome);
    }

    pub fn attach_profile(&self, profile: BusinessProfile) {
        self.state.write().business_profile = Some(profile);
    }

    /// Mark the run completed. Only the first call has any effect.
    pub fn mark_completed(&self, end_time: DateTime<Utc>) -> bool {
        let mut session = self.state.write();
        if session.status == SessionStatus::Completed {
            return false;
        }
        session.status = SessionStatus::Completed;
        session.end_time = Some(end_time);
        true
    }

    pub fn results(&self) -> BTreeMap<String, ToolResult> {
        self.state.read().results.clone()
    }

    pub fn tools_executed(&self) -> Vec<String> {
        self.state.read().tools_executed.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconError;
    use std::sync::Arc;
    use serde_json::json;

    #[test]
    fn test_new_session_is_running() {
        let session = Session::start("example.com");

        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.target_type, TargetType::Domain);
        assert!(session.session_id.starts_with("example.com_"));
        assert!(session.tools_executed.is_empty());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let now = Utc::now();
        assert_ne!(Session::generate_id("example.com", now), Session::generate_id("example.com", now));
    }

    #[test]
    fn test_record_once_per_tool() {
        let aggregator = SessionAggregator::new(Session::start("example.com"));

        assert!(aggregator.record(ToolResult::success("crt_sh", "example.com", json!({"count": 1}))));
        assert!(!aggregator.record(ToolResult::failure("crt_sh", "example.com", "late duplicate")));

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.tools_executed, vec!["crt_sh"]);
        assert!(snapshot.results["crt_sh"].success);
    }

    #[test]
    fn test_failed_persist_records_nothing() {
        let aggregator = SessionAggregator::new(Session::start("example.com"));

        let outcome = aggregator.record_with(ToolResult::success("crt_sh", "example.com", json!({})), |_| {
            Err(ReconError::UnexpectedError("disk full".to_string()))
        });

        assert!(outcome.is_err());
        assert!(!aggregator.contains("crt_sh"));
        assert!(aggregator.tools_executed().is_empty());
    }

    #[test]
    fn test_mark_completed_only_once() {
        let aggregator = SessionAggregator::new(Session::start("example.com"));
        let first = Utc::now();

        assert!(aggregator.mark_completed(first));
        assert!(!aggregator.mark_completed(Utc::now()));

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(snapshot.end_time, Some(first));
    }

    #[test]
    fn test_concurrent_records_are_all_visible() {
        let aggregator = Arc::new(SessionAggregator::new(Session::start("example.com")));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    aggregator.record(ToolResult::success(&format!("tool_{}", i), "example.com", json!(i)));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.tools_executed.len(), 16);
        assert_eq!(snapshot.results.len(), 16);
    }
}
