//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Classification and metrics code call store methods or go through the
//! `RangeSource` trait; they never execute SQL directly.

use crate::{error::RegionResult, event::RunEvent};
use rusqlite::{params, Connection};

mod boundary;
mod metrics;
mod query;
mod sites;

pub use query::{Condition, RangeQuery, Table};
pub use sites::{ParticipationRow, PointRow, SiteKind, SiteRow, StoredAssignment};

/// Rows returned by one range request when no ceiling is configured.
pub const DEFAULT_ROW_CEILING: usize = 1000;

pub struct RegionStore {
    conn: Connection,
    /// Hard per-request row limit, mirroring the hosted backing store.
    max_rows_per_request: usize,
}

/// One persisted run log line.
#[derive(Debug, Clone)]
pub struct RunLogEntry {
    pub id:         i64,
    pub run_id:     String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized RunEvent
}

impl RegionStore {
    pub fn open(path: &str) -> RegionResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, max_rows_per_request: DEFAULT_ROW_CEILING })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RegionResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, max_rows_per_request: DEFAULT_ROW_CEILING })
    }

    /// Override the per-request row ceiling.
    pub fn with_row_ceiling(mut self, max_rows: usize) -> Self {
        self.max_rows_per_request = max_rows.max(1);
        self
    }

    pub fn row_ceiling(&self) -> usize {
        self.max_rows_per_request
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RegionResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_sites.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_regions.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, version: &str) -> RegionResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, version, started_at) VALUES (?1, ?2, ?3)",
            params![run_id, version, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ── Run log ────────────────────────────────────────────────

    pub fn append_run_event(&self, run_id: &str, event: &RunEvent) -> RegionResult<()> {
        self.conn.execute(
            "INSERT INTO run_log (run_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                event.event_type(),
                serde_json::to_string(event)?,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn run_events(&self, run_id: &str) -> RegionResult<Vec<RunLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, event_type, payload
             FROM run_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(RunLogEntry {
                    id:         row.get(0)?,
                    run_id:     row.get(1)?,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
