use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "succeeded" => RunStatus::Succeeded,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

/// One row of the local run history.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub source_name: String,
    pub checksum: String,
    pub format: String,
    pub status: RunStatus,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub batch_rows: Option<i64>,
    pub staging_rows: Option<i64>,
    pub fact_rows: Option<i64>,
    pub error: Option<String>,
}

impl RunRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(4)?;
        Ok(Self {
            run_id: row.get(0)?,
            source_name: row.get(1)?,
            checksum: row.get(2)?,
            format: row.get(3)?,
            status: RunStatus::parse(&status),
            started_at: row.get(5)?,
            finished_at: row.get(6)?,
            batch_rows: row.get(7)?,
            staging_rows: row.get(8)?,
            fact_rows: row.get(9)?,
            error: row.get(10)?,
        })
    }

    pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.started_at, 0)
    }
}

const SELECT_COLUMNS: &str = "run_id, source_name, checksum, format, status, started_at, \
     finished_at, batch_rows, staging_rows, fact_rows, error";

/// Local SQLite history of pipeline runs
pub struct RunLedger {
    conn: Mutex<Connection>,
}

impl RunLedger {
    pub fn open_at_root<P: AsRef<Path>>(data_root: P) -> Result<Self> {
        let db_path = data_root.as_ref().join("ledger").join("runs.db");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pipeline_runs (
                run_id        TEXT PRIMARY KEY,
                source_name   TEXT NOT NULL,
                checksum      TEXT NOT NULL,
                format        TEXT NOT NULL,
                status        TEXT NOT NULL,
                started_at    INTEGER NOT NULL,
                finished_at   INTEGER,
                batch_rows    INTEGER,
                staging_rows  INTEGER,
                fact_rows     INTEGER,
                error         TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_checksum ON pipeline_runs (checksum);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn record_started(&self, run_id: Uuid, source_name: &str, checksum: &str, format: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO pipeline_runs (run_id, source_name, checksum, format, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id.to_string(),
                source_name,
                checksum,
                format,
                RunStatus::Running.as_str(),
                Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }

    pub fn record_succeeded(&self, run_id: Uuid, batch_rows: usize, staging_rows: usize, fact_rows: u64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE pipeline_runs
             SET status = ?2, finished_at = ?3, batch_rows = ?4, staging_rows = ?5, fact_rows = ?6
             WHERE run_id = ?1",
            params![
                run_id.to_string(),
                RunStatus::Succeeded.as_str(),
                Utc::now().timestamp(),
                batch_rows as i64,
                staging_rows as i64,
                fact_rows as i64
            ],
        )?;
        Ok(())
    }

    pub fn record_failed(&self, run_id: Uuid, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE pipeline_runs SET status = ?2, finished_at = ?3, error = ?4 WHERE run_id = ?1",
            params![
                run_id.to_string(),
                RunStatus::Failed.as_str(),
                Utc::now().timestamp(),
                error
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM pipeline_runs WHERE run_id = ?1"),
                params![run_id.to_string()],
                RunRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recent runs first.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM pipeline_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], RunRecord::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Latest successful run that published a file with this checksum.
    pub fn last_success_for_checksum(&self, checksum: &str) -> Result<Option<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM pipeline_runs
                     WHERE checksum = ?1 AND status = 'succeeded'
                     ORDER BY started_at DESC, rowid DESC LIMIT 1"
                ),
                params![checksum],
                RunRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tracks_run_lifecycle() {
        let ledger = RunLedger::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        ledger.record_started(id, "batch.csv", "abc", "csv").unwrap();
        assert_eq!(ledger.get(id).unwrap().unwrap().status, RunStatus::Running);

        ledger.record_succeeded(id, 10, 10, 8).unwrap();
        let record = ledger.get(id).unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Succeeded);
        assert_eq!(record.fact_rows, Some(8));
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn failed_runs_keep_the_error() {
        let ledger = RunLedger::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        ledger.record_started(id, "batch.xlsx", "def", "xlsx").unwrap();
        ledger.record_failed(id, "connection refused").unwrap();
        let record = ledger.get(id).unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn finds_previous_success_by_checksum() {
        let ledger = RunLedger::open_in_memory().unwrap();
        let failed = Uuid::new_v4();
        ledger.record_started(failed, "a.csv", "same", "csv").unwrap();
        ledger.record_failed(failed, "boom").unwrap();
        assert!(ledger.last_success_for_checksum("same").unwrap().is_none());

        let ok = Uuid::new_v4();
        ledger.record_started(ok, "a.csv", "same", "csv").unwrap();
        ledger.record_succeeded(ok, 1, 1, 1).unwrap();
        let found = ledger.last_success_for_checksum("same").unwrap().unwrap();
        assert_eq!(found.run_id, ok.to_string());
    }

    #[test]
    fn recent_is_newest_first_and_persists_on_disk() {
        let dir = tempdir().unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        {
            let ledger = RunLedger::open_at_root(dir.path()).unwrap();
            ledger.record_started(first, "one.csv", "1", "csv").unwrap();
            ledger.record_started(second, "two.csv", "2", "csv").unwrap();
        }
        let reopened = RunLedger::open_at_root(dir.path()).unwrap();
        let recent = reopened.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].run_id, second.to_string());
        assert_eq!(reopened.recent(1).unwrap().len(), 1);
    }
}
