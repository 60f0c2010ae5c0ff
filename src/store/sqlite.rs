//! SQLite-backed [`ReconStore`]

use std::collections::BTreeMap;
use std::path::Path;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::models::{SessionSummary, TargetStats};
use super::schema::run_migrations;
use super::ReconStore;
use crate::core::{
    AiAnalysis, AnalysisOutcome, BusinessProfile, Session, SessionStatus, TargetType, ToolResult,
};
use crate::error::{ReconError, ReconResult};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: &Path) -> ReconResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ReconError::FileError {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        run_migrations(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> ReconResult<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Number of persisted result rows for a session
    pub fn tool_result_count(&self, session_id: &str) -> ReconResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tool_results WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn load_results(conn: &Connection, session_id: &str) -> ReconResult<BTreeMap<String, ToolResult>> {
        let mut stmt = conn.prepare(
            "SELECT tool_name, target, success, data, error, execution_time, metadata, timestamp
             FROM tool_results WHERE session_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = BTreeMap::new();
        for (tool_name, target, success, data, error, execution_time, metadata, timestamp) in rows {
            let result = ToolResult {
                tool_name: tool_name.clone(),
                target,
                success,
                data: data.as_deref().map(serde_json::from_str).transpose()?,
                error,
                execution_time,
                metadata: serde_json::from_str::<Map<String, Value>>(&metadata)?,
                timestamp: parse_time(&timestamp)?,
            };
            results.insert(tool_name, result);
        }

        Ok(results)
    }

    fn load_analysis(conn: &Connection, session_id: &str) -> ReconResult<Option<AnalysisOutcome>> {
        let row = conn
            .query_row(
                "SELECT status, summary, key_findings, recommendations, risk_level,
                        interesting_targets, raw, reason
                 FROM ai_analysis WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, summary, key_findings, recommendations, risk_level, interesting, raw, reason)) = row else {
            return Ok(None);
        };

        let outcome = match status.as_str() {
            "completed" => AnalysisOutcome::Completed(AiAnalysis {
                summary,
                key_findings: decode_list(key_findings)?,
                recommendations: decode_list(recommendations)?,
                risk_level,
                interesting_targets: decode_list(interesting)?,
                raw: decode_value(raw)?,
            }),
            "unavailable" => AnalysisOutcome::Unavailable,
            _ => AnalysisOutcome::Failed {
                reason: reason.unwrap_or_default(),
            },
        };

        Ok(Some(outcome))
    }

    fn load_profile(conn: &Connection, session_id: &str) -> ReconResult<Option<BusinessProfile>> {
        let row = conn
            .query_row(
                "SELECT business_size, incorporation_date, locations, industry,
                        other_insights, source_tools, raw
                 FROM business_profiles WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((business_size, incorporation_date, locations, industry, insights, sources, raw)) = row else {
            return Ok(None);
        };

        Ok(Some(BusinessProfile {
            business_size,
            incorporation_date,
            locations: decode_list(locations)?,
            industry,
            other_insights: decode_list(insights)?,
            source_tools: decode_list(sources)?,
            raw: decode_value(raw)?,
        }))
    }
}

impl ReconStore for SqliteStore {
    fn upsert_target(&self, target: &str, target_type: TargetType) -> ReconResult<i64> {
        let conn = self.conn.lock();
        let now = format_time(&Utc::now());

        conn.execute(
            "INSERT INTO targets (target, target_type, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(target) DO UPDATE SET last_seen = excluded.last_seen",
            params![target, target_type.as_str(), now],
        )?;

        let id = conn.query_row(
            "SELECT id FROM targets WHERE target = ?1",
            params![target],
            |row| row.get(0),
        )?;

        debug!("Target {} has id {}", target, id);
        Ok(id)
    }

    fn create_session(&self, session: &Session, target_id: i64) -> ReconResult<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO sessions (session_id, target_id, target, status, start_time, end_time, tools_executed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.session_id,
                target_id,
                session.target,
                session.status.as_str(),
                format_time(&session.start_time),
                session.end_time.as_ref().map(format_time),
                serde_json::to_string(&session.tools_executed)?,
            ],
        )?;

        Ok(())
    }

    fn record_tool_result(&self, session_id: &str, result: &ToolResult) -> ReconResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let row: Option<(String, String)> = tx
            .query_row(
                "SELECT status, tools_executed FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (status, tools_executed) = row.ok_or_else(|| ReconError::SessionNotFound(session_id.to_string()))?;
        if status != SessionStatus::Running.as_str() {
            return Err(ReconError::InvalidTransition {
                session_id: session_id.to_string(),
                message: format!("cannot record '{}' on a {} session", result.tool_name, status),
            });
        }

        tx.execute(
            "INSERT INTO tool_results
                (session_id, tool_name, target, success, data, error, execution_time, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session_id,
                result.tool_name,
                result.target,
                result.success,
                result.data.as_ref().map(serde_json::to_string).transpose()?,
                result.error,
                result.execution_time,
                serde_json::to_string(&result.metadata)?,
                format_time(&result.timestamp),
            ],
        )?;

        let mut tools: Vec<String> = serde_json::from_str(&tools_executed)?;
        tools.push(result.tool_name.clone());

        tx.execute(
            "UPDATE sessions SET tools_executed = ?1 WHERE session_id = ?2",
            params![serde_json::to_string(&tools)?, session_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn complete_session(&self, session_id: &str, end_time: DateTime<Utc>) -> ReconResult<()> {
        let conn = self.conn.lock();

        let updated = conn.execute(
            "UPDATE sessions SET status = 'completed', end_time = ?1
             WHERE session_id = ?2 AND status = 'running'",
            params![format_time(&end_time), session_id],
        )?;

        if updated == 1 {
            return Ok(());
        }

        let exists: Option<String> = conn
            .query_row(
                "SELECT status FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        match exists {
            None => Err(ReconError::SessionNotFound(session_id.to_string())),
            Some(status) => Err(ReconError::InvalidTransition {
                session_id: session_id.to_string(),
                message: format!("cannot complete a {} session", status),
            }),
        }
    }

    fn upsert_ai_analysis(&self, session_id: &str, outcome: &AnalysisOutcome) -> ReconResult<()> {
        let conn = self.conn.lock();

        let (summary, key_findings, recommendations, risk_level, interesting, raw, reason) = match outcome {
            AnalysisOutcome::Completed(analysis) => (
                analysis.summary.clone(),
                Some(serde_json::to_string(&analysis.key_findings)?),
                Some(serde_json::to_string(&analysis.recommendations)?),
                analysis.risk_level.clone(),
                Some(serde_json::to_string(&analysis.interesting_targets)?),
                Some(serde_json::to_string(&analysis.raw)?),
                None,
            ),
            AnalysisOutcome::Unavailable => (None, None, None, None, None, None, None),
            AnalysisOutcome::Failed { reason } => (None, None, None, None, None, None, Some(reason.clone())),
        };

        conn.execute(
            "INSERT INTO ai_analysis
                (session_id, status, summary, key_findings, recommendations, risk_level,
                 interesting_targets, raw, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(session_id) DO UPDATE SET
                status = excluded.status,
                summary = excluded.summary,
                key_findings = excluded.key_findings,
                recommendations = excluded.recommendations,
                risk_level = excluded.risk_level,
                interesting_targets = excluded.interesting_targets,
                raw = excluded.raw,
                reason = excluded.reason,
                created_at = excluded.created_at",
            params![
                session_id,
                outcome.status(),
                summary,
                key_findings,
                recommendations,
                risk_level,
                interesting,
                raw,
                reason,
                format_time(&Utc::now()),
            ],
        )?;

        Ok(())
    }

    fn upsert_business_profile(&self, session_id: &str, profile: &BusinessProfile) -> ReconResult<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO business_profiles
                (session_id, business_size, incorporation_date, locations, industry,
                 other_insights, source_tools, raw, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(session_id) DO UPDATE SET
                business_size = excluded.business_size,
                incorporation_date = excluded.incorporation_date,
                locations = excluded.locations,
                industry = excluded.industry,
                other_insights = excluded.other_insights,
                source_tools = excluded.source_tools,
                raw = excluded.raw,
                created_at = excluded.created_at",
            params![
                session_id,
                profile.business_size,
                profile.incorporation_date,
                serde_json::to_string(&profile.locations)?,
                profile.industry,
                serde_json::to_string(&profile.other_insights)?,
                serde_json::to_string(&profile.source_tools)?,
                serde_json::to_string(&profile.raw)?,
                format_time(&Utc::now()),
            ],
        )?;

        Ok(())
    }

    fn load_session(&self, session_id: &str) -> ReconResult<Option<Session>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT s.session_id, s.target, t.target_type, s.status, s.start_time,
                        s.end_time, s.tools_executed
                 FROM sessions s JOIN targets t ON t.id = s.target_id
                 WHERE s.session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, target, target_type, status, start_time, end_time, tools_executed)) = row else {
            return Ok(None);
        };

        let session = Session {
            session_id: id,
            target_type: TargetType::parse(&target_type).unwrap_or_else(|| TargetType::detect(&target)),
            target,
            start_time: parse_time(&start_time)?,
            end_time: end_time.as_deref().map(parse_time).transpose()?,
            status: parse_status(&status)?,
            tools_executed: serde_json::from_str(&tools_executed)?,
            results: Self::load_results(&conn, session_id)?,
            ai_analysis: Self::load_analysis(&conn, session_id)?,
            business_profile: Self::load_profile(&conn, session_id)?,
            write_failures: Vec::new(),
        };

        Ok(Some(session))
    }

    fn list_sessions(&self, limit: usize, status: Option<SessionStatus>) -> ReconResult<Vec<SessionSummary>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT s.session_id, s.target, s.status, s.start_time, s.end_time,
                    (SELECT COUNT(*) FROM tool_results r WHERE r.session_id = s.session_id)
             FROM sessions s
             WHERE ?1 IS NULL OR s.status = ?1
             ORDER BY s.start_time DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![status.map(|s| s.as_str()), limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(session_id, target, status, start_time, end_time, tool_count)| {
                Ok(SessionSummary {
                    session_id,
                    target,
                    status: parse_status(&status)?,
                    start_time: parse_time(&start_time)?,
                    end_time: end_time.as_deref().map(parse_time).transpose()?,
                    tool_count: tool_count as usize,
                })
            })
            .collect()
    }

    fn target_stats(&self, target: &str) -> ReconResult<Option<TargetStats>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT t.target, t.target_type, t.first_seen, t.last_seen,
                        (SELECT COUNT(*) FROM sessions s WHERE s.target_id = t.id),
                        (SELECT COUNT(*) FROM tool_results r
                            JOIN sessions s ON s.session_id = r.session_id
                            WHERE s.target_id = t.id),
                        (SELECT s.session_id FROM sessions s WHERE s.target_id = t.id
                            ORDER BY s.start_time DESC LIMIT 1)
                 FROM targets t WHERE t.target = ?1",
                params![target],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((target, target_type, first_seen, last_seen, sessions, results, latest)) = row else {
            return Ok(None);
        };

        Ok(Some(TargetStats {
            target_type: TargetType::parse(&target_type).unwrap_or_else(|| TargetType::detect(&target)),
            target,
            first_seen: parse_time(&first_seen)?,
            last_seen: parse_time(&last_seen)?,
            session_count: sessions as usize,
            tool_result_count: results as usize,
            latest_session: latest,
        }))
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(value: &str) -> ReconResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| ReconError::UnexpectedError(format!("Invalid timestamp '{}' in database: {}", value, e)))
}

fn parse_status(value: &str) -> ReconResult<SessionStatus> {
    SessionStatus::parse(value)
        .ok_or_else(|| ReconError::UnexpectedError(format!("Invalid session status '{}' in database", value)))
}

fn decode_list(value: Option<String>) -> ReconResult<Vec<String>> {
    match value {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Vec::new()),
    }
}

fn decode_value(value: Option<String>) -> ReconResult<Value> {
    match value {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Value::Null),
    }
}
