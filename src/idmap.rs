//! The Id Map Store: a small embedded relational store with one table per
//! [`ItemKind`], mapping a local integer id to a remote string id.
//!
//! Each operation opens and closes its own connection (§4.2's concurrency
//! policy) so that a write from dispatch bookkeeping is immediately visible
//! to the next `lookup` — there is no held connection or cache to go stale.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::model::ItemKind;

pub struct IdMapStore {
    db_path: PathBuf,
}

impl IdMapStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }

    fn connect(&self) -> Result<Connection, SyncError> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// (Re)create the schema for every known item kind. This **drops and
    /// recreates** every table, discarding prior mappings — correct only
    /// because this is an explicit operator action (`init-config`), never
    /// called on ordinary daemon startup. See §4.2 and DESIGN.md.
    pub fn init_schema(&self) -> Result<(), SyncError> {
        let conn = self.connect()?;
        for kind in ItemKind::all() {
            conn.execute_batch(&format!(
                "DROP TABLE IF EXISTS {table};
                 CREATE TABLE {table} (
                     local_id INTEGER PRIMARY KEY,
                     remote_id TEXT NOT NULL
                 );",
                table = kind.table_name()
            ))?;
        }
        Ok(())
    }

    /// Return the remote id mapped to `(kind, local_id)`, or `Unmapped`.
    pub fn lookup(&self, kind: ItemKind, local_id: i64) -> Result<String, SyncError> {
        let conn = self.connect()?;
        let remote_id: Option<String> = conn
            .query_row(
                &format!("SELECT remote_id FROM {} WHERE local_id = ?1", kind.table_name()),
                params![local_id],
                |row| row.get(0),
            )
            .optional()?;
        remote_id.ok_or(SyncError::Unmapped { kind, local_id })
    }

    /// Overwrite any prior binding for `(kind, local_id)`.
    pub fn upsert(&self, kind: ItemKind, local_id: i64, remote_id: &str) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO {table} (local_id, remote_id) VALUES (?1, ?2)
                 ON CONFLICT(local_id) DO UPDATE SET remote_id = excluded.remote_id",
                table = kind.table_name()
            ),
            params![local_id, remote_id],
        )?;
        Ok(())
    }

    /// Remove any prior binding for `(kind, local_id)`. A no-op if absent.
    pub fn erase(&self, kind: ItemKind, local_id: i64) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE local_id = ?1", kind.table_name()),
            params![local_id],
        )?;
        Ok(())
    }
}

/// A read-only capability handed to handlers, so handler code cannot
/// accidentally perform dispatch bookkeeping writes outside the dispatcher.
pub trait IdMapReader {
    fn lookup(&self, kind: ItemKind, local_id: i64) -> Result<String, SyncError>;
}

impl IdMapReader for IdMapStore {
    fn lookup(&self, kind: ItemKind, local_id: i64) -> Result<String, SyncError> {
        IdMapStore::lookup(self, kind, local_id)
    }
}

pub fn idmap_path(conf_dir: &Path) -> PathBuf {
    conf_dir.join("gmids.db")
}
