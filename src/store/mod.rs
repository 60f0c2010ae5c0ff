//! Durable record of targets, sessions and tool results.
//!
//! Writes are small local transactions, so the trait is synchronous and is
//! called directly from the executor's write-through path.

mod models;
mod schema;
mod sqlite;

use chrono::{DateTime, Utc};

use crate::core::{AnalysisOutcome, BusinessProfile, Session, SessionStatus, TargetType, ToolResult};
use crate::error::ReconResult;

pub use models::{SessionSummary, TargetStats};
pub use schema::{run_migrations, SCHEMA};
pub use sqlite::SqliteStore;

pub trait ReconStore: Send + Sync {
    /// Insert the target if new, otherwise only bump its last-seen time.
    /// Returns the stable target id either way.
    fn upsert_target(&self, target: &str, target_type: TargetType) -> ReconResult<i64>;

    /// Write a freshly started session in the `running` state
    fn create_session(&self, session: &Session, target_id: i64) -> ReconResult<()>;

    /// Atomically insert the result row and append the tool to the session's
    /// `tools_executed`. Fails if the tool already has a row for this session.
    fn record_tool_result(&self, session_id: &str, result: &ToolResult) -> ReconResult<()>;

    /// `running -> completed`; any other transition is `InvalidTransition`
    fn complete_session(&self, session_id: &str, end_time: DateTime<Utc>) -> ReconResult<()>;

    fn upsert_ai_analysis(&self, session_id: &str, outcome: &AnalysisOutcome) -> ReconResult<()>;

    fn upsert_business_profile(&self, session_id: &str, profile: &BusinessProfile) -> ReconResult<()>;

    /// Rebuild a session, its results and annotations from storage
    fn load_session(&self, session_id: &str) -> ReconResult<Option<Session>>;

    /// Newest first, optionally restricted to one status
    fn list_sessions(&self, limit: usize, status: Option<SessionStatus>) -> ReconResult<Vec<SessionSummary>>;

    fn target_stats(&self, target: &str) -> ReconResult<Option<TargetStats>>;
}
