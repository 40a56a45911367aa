//! Upsert reconciler: persists canonical record batches into SQLite with
//! last-write-wins semantics keyed by the external identifier.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::info;

use crate::error::{ImportError, Result};
use crate::normalize::CanonicalRecord;

/// A persisted capture session, as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub external_id: String,
    pub project_name: Option<String>,
    pub character_name: Option<String>,
    pub actor_name: Option<String>,
    pub capture_date: Option<String>,
    pub duration_minutes: Option<i64>,
    pub imported_at: String,
}

pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| ImportError::Connection {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| ImportError::Connection {
            path: ":memory:".into(),
            source: e,
        })?;
        Ok(Self { conn })
    }

    /// Idempotent schema setup; safe to call on every run.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS capture_sessions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id      TEXT NOT NULL UNIQUE,
                project_name     TEXT,
                character_name   TEXT,
                actor_name       TEXT,
                capture_date     TEXT,
                duration_minutes INTEGER,
                imported_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;
        Ok(())
    }

    /// Applies a batch as one transaction: insert on first sighting of an
    /// external id, overwrite every non-key field (and refresh `imported_at`)
    /// on every later one. Any failure rolls the whole batch back.
    ///
    /// The conflict resolution is a single conditional write per record, not
    /// a lookup followed by a write, so concurrent batches cannot interleave
    /// between check and update.
    pub fn upsert_batch(&mut self, records: &[CanonicalRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut affected = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO capture_sessions (
                     external_id, project_name, character_name, actor_name,
                     capture_date, duration_minutes
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(external_id) DO UPDATE SET
                     project_name = excluded.project_name,
                     character_name = excluded.character_name,
                     actor_name = excluded.actor_name,
                     capture_date = excluded.capture_date,
                     duration_minutes = excluded.duration_minutes,
                     imported_at = CURRENT_TIMESTAMP",
            )?;
            for record in records {
                affected += stmt.execute(params![
                    record.external_id,
                    record.project_name,
                    record.character_name,
                    record.actor_name,
                    record.capture_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    record.duration_minutes,
                ])?;
            }
        }
        tx.commit()?;

        info!(affected, "batch upsert committed");
        Ok(affected)
    }

    pub fn get(&self, external_id: &str) -> Result<Option<StoredSession>> {
        let session = self
            .conn
            .query_row(
                "SELECT external_id, project_name, character_name, actor_name,
                        capture_date, duration_minutes, imported_at
                 FROM capture_sessions WHERE external_id = ?1",
                params![external_id],
                |row| {
                    Ok(StoredSession {
                        external_id: row.get(0)?,
                        project_name: row.get(1)?,
                        character_name: row.get(2)?,
                        actor_name: row.get(3)?,
                        capture_date: row.get(4)?,
                        duration_minutes: row.get(5)?,
                        imported_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn count(&self) -> Result<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM capture_sessions", [], |row| row.get(0))?;
        Ok(n)
    }
}
