//! Handler dispatch: resolves a change-log row to a handler for its change
//! type, supplies the context it needs, and interprets the result.
//!
//! Per §9's redesign note, handlers are plain functions over an immutable
//! [`HandlerContext`] rather than the original's per-call `Handler`
//! subclass that captured a `get_gm_id` bound method at construction. The
//! binding (which table names/handlers go with which change type) is a data
//! table the caller owns, not something this module hardcodes.

use rusqlite::Connection;

use crate::error::SyncError;
use crate::idmap::IdMapReader;
use crate::model::HandlerResult;
use crate::remote::RemoteClient;

/// Everything a handler needs to push one change out to the remote
/// service. Constructed fresh per dispatch; holds only borrows, so there is
/// no handler-local state to leak between invocations.
pub struct HandlerContext<'a> {
    pub local_id: i64,
    pub remote: &'a dyn RemoteClient,
    pub watched_db: &'a Connection,
    pub id_map: &'a dyn IdMapReader,
}

impl<'a> HandlerContext<'a> {
    /// Convenience matching the original's `gms_id`/`gmp_id` properties:
    /// look up the remote id for `local_id` under `kind`, raising
    /// `Unmapped` if none exists.
    pub fn mapped_remote_id(&self, kind: crate::model::ItemKind) -> Result<String, SyncError> {
        self.id_map.lookup(kind, self.local_id)
    }
}

/// A handler: stateless, idempotent under replay, one per watched point.
pub type HandlerFn = fn(&HandlerContext) -> Result<HandlerResult, SyncError>;

/// Map a `change_type` to its handler by vector index. The vector's length
/// is guaranteed equal to the instrumentation's point count by construction
/// (see [`crate::binding::Binding`]).
pub fn dispatch(
    handlers: &[HandlerFn],
    change_type: i64,
    ctx: &HandlerContext,
) -> Result<HandlerResult, SyncError> {
    let idx = usize::try_from(change_type)
        .map_err(|_| SyncError::HandlerBug(format!("negative change_type {change_type}")))?;
    let handler = handlers
        .get(idx)
        .ok_or_else(|| SyncError::HandlerBug(format!("change_type {change_type} has no handler")))?;
    handler(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idmap::IdMapStore;
    use crate::model::ItemKind;
    use crate::remote::MockRemoteClient;

    fn create_song_handler(ctx: &HandlerContext) -> Result<HandlerResult, SyncError> {
        let title: String = ctx
            .watched_db
            .query_row("SELECT title FROM songs WHERE id = ?1", [ctx.local_id], |r| r.get(0))?;
        let remote_id = ctx.remote.create_song(&title, "unknown artist")?;
        Ok(HandlerResult::Create { kind: ItemKind::Song, remote_id })
    }

    #[test]
    fn dispatch_invokes_handler_by_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE songs (id INTEGER PRIMARY KEY, title TEXT); INSERT INTO songs VALUES (42, 'Blue');").unwrap();
        let remote = MockRemoteClient::new();
        let dir = tempfile::tempdir().unwrap();
        let id_map = IdMapStore::new(dir.path().join("gmids.db"));
        id_map.init_schema().unwrap();

        let ctx = HandlerContext { local_id: 42, remote: &remote, watched_db: &conn, id_map: &id_map };
        let handlers: Vec<HandlerFn> = vec![create_song_handler];
        let result = dispatch(&handlers, 0, &ctx).unwrap();
        assert!(matches!(result, HandlerResult::Create { kind: ItemKind::Song, .. }));
    }

    #[test]
    fn dispatch_out_of_range_is_handler_bug() {
        let conn = Connection::open_in_memory().unwrap();
        let remote = MockRemoteClient::new();
        let dir = tempfile::tempdir().unwrap();
        let id_map = IdMapStore::new(dir.path().join("gmids.db"));
        id_map.init_schema().unwrap();
        let ctx = HandlerContext { local_id: 1, remote: &remote, watched_db: &conn, id_map: &id_map };
        let handlers: Vec<HandlerFn> = vec![create_song_handler];
        assert!(matches!(dispatch(&handlers, 5, &ctx), Err(SyncError::HandlerBug(_))));
    }
}
