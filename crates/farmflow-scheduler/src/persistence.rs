//! SQLite-backed run history.
//! One row per finished run; the full summary is kept as JSON next to the
//! counters so old runs can be shown without re-parsing logs.

use std::path::Path;

use chrono::{DateTime, Utc};
use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::types::ExecutionSummary;
use serde::{Deserialize, Serialize};

/// A stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: i64,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success_count: u32,
    pub failed_count: u32,
    pub skipped_count: u32,
    pub stopped: bool,
    pub summary: ExecutionSummary,
}

/// SQLite-backed run history store.
pub struct RunHistoryDb {
    conn: rusqlite::Connection,
}

fn db_err(context: &str, e: rusqlite::Error) -> FarmflowError {
    FarmflowError::Database(format!("{context}: {e}"))
}

impl RunHistoryDb {
    /// Open or create the history database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path).map_err(|e| db_err("DB open", e))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database, gone when dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| db_err("DB open", e))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS run_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                success_count INTEGER NOT NULL DEFAULT 0,
                failed_count INTEGER NOT NULL DEFAULT 0,
                skipped_count INTEGER NOT NULL DEFAULT 0,
                stopped INTEGER NOT NULL DEFAULT 0,
                summary TEXT NOT NULL            -- ExecutionSummary as JSON
            );
            CREATE INDEX IF NOT EXISTS idx_run_history_started ON run_history(started_at);
         ",
            )
            .map_err(|e| db_err("Migration", e))
    }

    /// Store a finished run, returning its row id.
    pub fn record(&self, summary: &ExecutionSummary) -> Result<i64> {
        let json = serde_json::to_string(summary)?;
        self.conn
            .execute(
                "INSERT INTO run_history
                 (run_id, started_at, duration_ms, success_count, failed_count, skipped_count, stopped, summary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    summary.run_id,
                    summary.started_at.to_rfc3339(),
                    summary.duration_ms as i64,
                    summary.success_count,
                    summary.failed_count,
                    summary.skipped_count,
                    summary.stopped as i32,
                    json,
                ],
            )
            .map_err(|e| db_err("Record run", e))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent runs first.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, run_id, started_at, duration_ms, success_count, failed_count, skipped_count, stopped, summary
                 FROM run_history ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| db_err("Query runs", e))?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                let started_at_str: String = row.get(2)?;
                let summary_str: String = row.get(8)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    started_at_str,
                    row.get::<_, i64>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, i32>(7)? != 0,
                    summary_str,
                ))
            })
            .map_err(|e| db_err("Query runs", e))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, run_id, started, duration, ok, failed, skipped, stopped, summary_str) =
                row.map_err(|e| db_err("Read run", e))?;
            let started_at = DateTime::parse_from_rfc3339(&started)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            let summary = match serde_json::from_str(&summary_str) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("⚠️ Unreadable summary for run #{id}: {e}");
                    ExecutionSummary::new(&run_id, started_at)
                }
            };
            records.push(RunRecord {
                id,
                run_id,
                started_at,
                duration_ms: duration.max(0) as u64,
                success_count: ok,
                failed_count: failed,
                skipped_count: skipped,
                stopped,
                summary,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(run_id: &str, failed: bool) -> ExecutionSummary {
        let mut s = ExecutionSummary::new(run_id, Utc::now());
        s.record_success("Wake: started");
        if failed {
            s.record_failure("Farm (1-7)", "device offline");
        }
        s.duration_ms = 1234;
        s
    }

    #[test]
    fn test_open_and_migrate() {
        let dir = std::env::temp_dir().join("farmflow-history-test");
        std::fs::remove_dir_all(&dir).ok();
        let db = RunHistoryDb::open(&dir.join("history.db")).unwrap();
        assert!(db.recent(10).unwrap().is_empty());
        drop(db);
        // Reopening an existing database is fine.
        RunHistoryDb::open(&dir.join("history.db")).unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_record_and_recent() {
        let db = RunHistoryDb::open_in_memory().unwrap();
        db.record(&summary("morning", false)).unwrap();
        db.record(&summary("evening", true)).unwrap();

        let runs = db.recent(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "evening");
        assert_eq!(runs[0].failed_count, 1);
        assert_eq!(runs[0].duration_ms, 1234);
        assert_eq!(runs[0].summary.errors[0].reason, "device offline");
        assert_eq!(runs[1].run_id, "morning");

        assert_eq!(db.recent(1).unwrap().len(), 1);
    }
}
