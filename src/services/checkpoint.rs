//! SQLite ledger of documents already stored, used to resume interrupted runs.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ingested (
    collection TEXT NOT NULL,
    source_id TEXT NOT NULL,
    checksum TEXT NOT NULL,
    chunks INTEGER NOT NULL,
    vectors INTEGER NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (collection, source_id)
);

CREATE INDEX IF NOT EXISTS idx_ingested_collection ON ingested(collection);
"#;

pub struct Checkpoint {
    conn: Mutex<Connection>,
}

impl Checkpoint {
    pub fn open(path: &Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, CheckpointError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CheckpointError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CheckpointError> {
        self.conn.lock().map_err(|_| CheckpointError::LockPoisoned)
    }

    /// True when `source_id` was stored into `collection` with this exact checksum.
    pub fn is_current(
        &self,
        collection: &str,
        source_id: &str,
        checksum: &str,
    ) -> Result<bool, CheckpointError> {
        let stored: Option<String> = self
            .conn()?
            .query_row(
                "SELECT checksum FROM ingested WHERE collection = ?1 AND source_id = ?2",
                params![collection, source_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored.as_deref() == Some(checksum))
    }

    pub fn record(
        &self,
        collection: &str,
        source_id: &str,
        checksum: &str,
        chunks: usize,
        vectors: usize,
    ) -> Result<(), CheckpointError> {
        self.conn()?.execute(
            "INSERT INTO ingested (collection, source_id, checksum, chunks, vectors, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(collection, source_id) DO UPDATE SET
                checksum = excluded.checksum,
                chunks = excluded.chunks,
                vectors = excluded.vectors,
                stored_at = excluded.stored_at",
            params![
                collection,
                source_id,
                checksum,
                chunks as i64,
                vectors as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Drop every entry of `collection`. Returns the number removed.
    pub fn forget_collection(&self, collection: &str) -> Result<usize, CheckpointError> {
        Ok(self
            .conn()?
            .execute("DELETE FROM ingested WHERE collection = ?1", params![collection])?)
    }

    pub fn stats(&self, collection: &str) -> Result<CheckpointStats, CheckpointError> {
        Ok(self.conn()?.query_row(
            "SELECT COUNT(*), COALESCE(SUM(chunks), 0), COALESCE(SUM(vectors), 0), MAX(stored_at)
             FROM ingested WHERE collection = ?1",
            params![collection],
            |row| {
                Ok(CheckpointStats {
                    documents: row.get::<_, i64>(0)? as u64,
                    chunks: row.get::<_, i64>(1)? as u64,
                    vectors: row.get::<_, i64>(2)? as u64,
                    last_stored_at: row.get(3)?,
                })
            },
        )?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointStats {
    pub documents: u64,
    pub chunks: u64,
    pub vectors: u64,
    pub last_stored_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_is_current() {
        let ledger = Checkpoint::open_in_memory().unwrap();
        assert!(!ledger.is_current("docs", "a.md", "abc").unwrap());

        ledger.record("docs", "a.md", "abc", 3, 3).unwrap();
        assert!(ledger.is_current("docs", "a.md", "abc").unwrap());
        assert!(!ledger.is_current("docs", "a.md", "changed").unwrap());
        assert!(!ledger.is_current("other", "a.md", "abc").unwrap());
    }

    #[test]
    fn test_record_overwrites_previous_entry() {
        let ledger = Checkpoint::open_in_memory().unwrap();
        ledger.record("docs", "a.md", "v1", 3, 3).unwrap();
        ledger.record("docs", "a.md", "v2", 5, 4).unwrap();

        assert!(ledger.is_current("docs", "a.md", "v2").unwrap());
        let stats = ledger.stats("docs").unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 5);
        assert_eq!(stats.vectors, 4);
        assert!(stats.last_stored_at.is_some());
    }

    #[test]
    fn test_forget_collection() {
        let ledger = Checkpoint::open_in_memory().unwrap();
        ledger.record("docs", "a.md", "x", 1, 1).unwrap();
        ledger.record("docs", "b.md", "y", 1, 1).unwrap();
        ledger.record("notes", "c.md", "z", 1, 1).unwrap();

        assert_eq!(ledger.forget_collection("docs").unwrap(), 2);
        assert_eq!(ledger.stats("docs").unwrap(), CheckpointStats::default());
        assert_eq!(ledger.stats("notes").unwrap().documents, 1);
    }

    #[test]
    fn test_open_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("checkpoint.db");

        Checkpoint::open(&path)
            .unwrap()
            .record("docs", "a.md", "abc", 2, 2)
            .unwrap();

        let reopened = Checkpoint::open(&path).unwrap();
        assert!(reopened.is_current("docs", "a.md", "abc").unwrap());
    }
}
