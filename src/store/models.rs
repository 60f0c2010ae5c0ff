use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::{SessionStatus, TargetType};

/// One row of `list_sessions`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub target: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub tool_count: usize,
}

/// Aggregate history of one target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetStats {
    pub target: String,
    pub target_type: TargetType,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub session_count: usize,
    pub tool_result_count: usize,
    pub latest_session: Option<String>,
}
