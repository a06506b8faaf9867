//! # redb-backed Snapshot Storage
//!
//! A disk-backed snapshot store using the redb embedded database.
//!
//! The whole graph is persisted as one blob per write, so a single-value
//! table is all that is needed. redb provides:
//! - ACID transactions (a crash mid-write leaves the previous snapshot intact)
//! - Crash safety (copy-on-write B-trees)
//! - Zero configuration
//!
//! The blob stored here is exactly the output of
//! `formats::persistence::knowledge_to_bytes`, header included, so the
//! same validation path covers both the file and database backends.

use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::Path;

use crate::types::LoreError;

/// Single-value table: snapshot name -> snapshot bytes.
const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Key under which the one live snapshot is stored.
const CURRENT: &str = "current";

/// A disk-backed snapshot store using redb.
pub struct SnapshotDb {
    db: Database,
}

impl std::fmt::Debug for SnapshotDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotDb").finish_non_exhaustive()
    }
}

impl SnapshotDb {
    /// Open or create a snapshot database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoreError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| LoreError::Persistence(e.to_string()))?;

        // Initialize the table so a fresh database reads back as empty
        // instead of erroring on a missing table.
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| LoreError::Persistence(e.to_string()))?;
            let _ = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| LoreError::Persistence(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| LoreError::Persistence(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Replace the stored snapshot in one ACID transaction.
    pub fn save(&self, bytes: &[u8]) -> Result<(), LoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| LoreError::Persistence(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| LoreError::Persistence(e.to_string()))?;
            table
                .insert(CURRENT, bytes)
                .map_err(|e| LoreError::Persistence(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| LoreError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Read the stored snapshot, if any.
    pub fn load(&self) -> Result<Option<Vec<u8>>, LoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LoreError::Persistence(e.to_string()))?;
        let table = read_txn
            .open_table(SNAPSHOTS)
            .map_err(|e| LoreError::Persistence(e.to_string()))?;
        let bytes = table
            .get(CURRENT)
            .map_err(|e| LoreError::Persistence(e.to_string()))?
            .map(|guard| guard.value().to_vec());
        Ok(bytes)
    }

    /// Compact the database (optional maintenance).
    pub fn compact(&mut self) -> Result<(), LoreError> {
        self.db
            .compact()
            .map_err(|e| LoreError::Persistence(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_has_no_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = SnapshotDb::open(dir.path().join("lore.redb")).expect("open");
        assert!(db.load().expect("load").is_none());
    }

    #[test]
    fn save_then_load_returns_same_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = SnapshotDb::open(dir.path().join("lore.redb")).expect("open");

        db.save(b"first").expect("save");
        db.save(b"second").expect("save");
        assert_eq!(db.load().expect("load").as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lore.redb");

        {
            let db = SnapshotDb::open(&path).expect("open");
            db.save(b"durable").expect("save");
        }

        let reopened = SnapshotDb::open(&path).expect("reopen");
        assert_eq!(
            reopened.load().expect("load").as_deref(),
            Some(&b"durable"[..])
        );
    }
}
