//! Contact graph: targets linked to the emails and phone numbers tools found
//! for them. Ingestion is best-effort; the engine logs and swallows failures.

use std::path::Path;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ReconError, ReconResult};

const GRAPH_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS graph_targets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    value TEXT NOT NULL,
    kind TEXT NOT NULL,
    source TEXT,
    created_at TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    PRIMARY KEY (value, kind)
);

CREATE TABLE IF NOT EXISTS has_contact (
    target TEXT NOT NULL REFERENCES graph_targets(name),
    value TEXT NOT NULL,
    kind TEXT NOT NULL,
    source TEXT,
    last_seen TEXT NOT NULL,
    PRIMARY KEY (target, value, kind)
);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Email,
    Phone,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Email => "email",
            ContactKind::Phone => "phone",
        }
    }
}

pub trait ContactGraph: Send + Sync {
    fn ingest_contacts(&self, target: &str, emails: &[String], phones: &[String], source: &str) -> ReconResult<()>;
}

/// Emails and phone numbers found at the top level of a tool's payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contacts {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}

impl Contacts {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phones.is_empty()
    }
}

pub fn extract_contacts(data: &Value) -> Contacts {
    let Some(object) = data.as_object() else {
        return Contacts::default();
    };

    let strings = |key: &str| -> Vec<String> {
        object
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    Contacts {
        emails: strings("emails"),
        phones: strings("phones"),
    }
}

pub fn normalize_target(target: &str) -> String {
    target
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Digits and `+` only; falls back to the raw value if nothing is left
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    if digits.is_empty() {
        phone.trim().to_string()
    } else {
        digits
    }
}

/// [`ContactGraph`] stored as node and edge tables in SQLite
pub struct SqliteContactGraph {
    conn: Mutex<Connection>,
}

impl SqliteContactGraph {
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
        conn.execute_batch(GRAPH_SCHEMA)?;

        info!("Contact graph opened at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> ReconResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(GRAPH_SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Contacts linked to a target, as `(kind, value)` pairs
    pub fn contacts_for(&self, target: &str) -> ReconResult<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT kind, value FROM has_contact WHERE target = ?1 ORDER BY kind, value",
        )?;

        let rows = stmt
            .query_map(params![normalize_target(target)], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

impl ContactGraph for SqliteContactGraph {
    fn ingest_contacts(&self, target: &str, emails: &[String], phones: &[String], source: &str) -> ReconResult<()> {
        let contacts: Vec<(ContactKind, String)> = emails
            .iter()
            .filter(|e| !e.trim().is_empty())
            .map(|e| (ContactKind::Email, normalize_email(e)))
            .chain(
                phones
                    .iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| (ContactKind::Phone, normalize_phone(p))),
            )
            .collect();

        if contacts.is_empty() {
            return Ok(());
        }

        let target = normalize_target(target);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO graph_targets (name, created_at, last_seen) VALUES (?1, ?2, ?2)
             ON CONFLICT(name) DO UPDATE SET last_seen = excluded.last_seen",
            params![target, now],
        )?;

        for (kind, value) in &contacts {
            tx.execute(
                "INSERT INTO contacts (value, kind, source, created_at, last_seen) VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(value, kind) DO UPDATE SET last_seen = excluded.last_seen, source = excluded.source",
                params![value, kind.as_str(), source, now],
            )?;
            tx.execute(
                "INSERT INTO has_contact (target, value, kind, source, last_seen) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(target, value, kind) DO UPDATE SET source = excluded.source, last_seen = excluded.last_seen",
                params![target, value, kind.as_str(), source, now],
            )?;
        }

        tx.commit()?;
        debug!("Ingested {} contacts for {} from {}", contacts.len(), target, source);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_contacts_top_level_only() {
        let data = json!({
            "emails": ["Info@Example.com", "", 42],
            "phones": ["+1 (555) 010-9999"],
            "nested": {"emails": ["hidden@example.com"]}
        });

        let contacts = extract_contacts(&data);
        assert_eq!(contacts.emails, vec!["Info@Example.com"]);
        assert_eq!(contacts.phones, vec!["+1 (555) 010-9999"]);

        assert!(extract_contacts(&json!(["a@b.com"])).is_empty());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_target("https://example.com/"), "example.com");
        assert_eq!(normalize_email(" Sales@Example.COM "), "sales@example.com");
        assert_eq!(normalize_phone("+34 (91) 123-45-67"), "+34911234567");
        assert_eq!(normalize_phone("n/a"), "n/a");
    }

    #[test]
    fn test_ingest_merges_duplicates() {
        let graph = SqliteContactGraph::in_memory().unwrap();
        let emails = vec!["Info@Example.com".to_string(), "info@example.com".to_string()];
        let phones = vec!["+1 555 010 9999".to_string()];

        graph.ingest_contacts("https://example.com/", &emails, &phones, "corporate_site").unwrap();
        graph.ingest_contacts("example.com", &emails, &[], "hunter").unwrap();

        let contacts = graph.contacts_for("example.com").unwrap();
        assert_eq!(
            contacts,
            vec![
                ("email".to_string(), "info@example.com".to_string()),
                ("phone".to_string(), "+15550109999".to_string()),
            ]
        );
    }

    #[test]
    fn test_ingest_nothing_is_noop() {
        let graph = SqliteContactGraph::in_memory().unwrap();
        graph.ingest_contacts("example.com", &[], &["  ".to_string()], "corporate_site").unwrap();
        assert!(graph.contacts_for("example.com").unwrap().is_empty());
    }
}
