//! A demo media-player binding, standing in for the original source's
//! `mediamonkey` config module. Exercises two watched points (a song
//! insert, a playlist rename/delete pair) against whatever `RemoteClient`
//! the caller supplies — normally [`gmsyncd::remote::MockRemoteClient`] in
//! tests.
//!
//! Not part of the `gmsyncd` crate itself: this lives outside `src/` so the
//! core engine never depends on any one media player's table names or
//! column layout. Integration tests pull it in with `#[path = ...]`.

use gmsyncd::binding::Binding;
use gmsyncd::dispatch::HandlerContext;
use gmsyncd::error::SyncError;
use gmsyncd::{HandlerResult, ItemKind, TriggerTiming, WatchedPoint};
use rusqlite::Connection;

pub fn watched_schema(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE songs (id INTEGER PRIMARY KEY, title TEXT NOT NULL, artist TEXT NOT NULL);
         CREATE TABLE playlists (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE playlist_entries (
             id INTEGER PRIMARY KEY,
             playlist_id INTEGER NOT NULL,
             song_id INTEGER NOT NULL
         );",
    )
    .unwrap();
}

fn handle_song_insert(ctx: &HandlerContext) -> Result<HandlerResult, SyncError> {
    let (title, artist): (String, String) = ctx.watched_db.query_row(
        "SELECT title, artist FROM songs WHERE id = ?1",
        [ctx.local_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    let remote_id = ctx.remote.create_song(&title, &artist)?;
    Ok(HandlerResult::Create { kind: ItemKind::Song, remote_id })
}

fn handle_playlist_insert(ctx: &HandlerContext) -> Result<HandlerResult, SyncError> {
    let name: String = ctx
        .watched_db
        .query_row("SELECT name FROM playlists WHERE id = ?1", [ctx.local_id], |r| r.get(0))?;
    let remote_id = ctx.remote.create_playlist(&name)?;
    Ok(HandlerResult::Create { kind: ItemKind::Playlist, remote_id })
}

fn handle_playlist_rename(ctx: &HandlerContext) -> Result<HandlerResult, SyncError> {
    let name: String = ctx
        .watched_db
        .query_row("SELECT name FROM playlists WHERE id = ?1", [ctx.local_id], |r| r.get(0))?;
    let remote_id = ctx.mapped_remote_id(ItemKind::Playlist)?;
    ctx.remote.rename_playlist(&remote_id, &name)?;
    Ok(HandlerResult::None)
}

fn handle_playlist_delete(ctx: &HandlerContext) -> Result<HandlerResult, SyncError> {
    let remote_id = ctx.mapped_remote_id(ItemKind::Playlist)?;
    ctx.remote.delete_playlist(&remote_id)?;
    Ok(HandlerResult::Delete { kind: ItemKind::Playlist })
}

fn handle_playlist_entry_insert(ctx: &HandlerContext) -> Result<HandlerResult, SyncError> {
    let (playlist_id, song_id): (i64, i64) = ctx.watched_db.query_row(
        "SELECT playlist_id, song_id FROM playlist_entries WHERE id = ?1",
        [ctx.local_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    let playlist_remote = ctx.id_map_lookup(ItemKind::Playlist, playlist_id)?;
    let song_remote = ctx.id_map_lookup(ItemKind::Song, song_id)?;
    ctx.remote.add_playlist_entry(&playlist_remote, &song_remote)?;
    Ok(HandlerResult::None)
}

/// Small helper extending `HandlerContext` usage to a foreign local id
/// (e.g. a foreign-key column rather than the change's own `local_id`).
trait IdMapLookupExt {
    fn id_map_lookup(&self, kind: ItemKind, local_id: i64) -> Result<String, SyncError>;
}

impl IdMapLookupExt for HandlerContext<'_> {
    fn id_map_lookup(&self, kind: ItemKind, local_id: i64) -> Result<String, SyncError> {
        gmsyncd::idmap::IdMapReader::lookup(self.id_map, kind, local_id)
    }
}

pub fn connect(path: &std::path::Path) -> Result<Connection, SyncError> {
    Ok(Connection::open(path)?)
}

pub fn binding() -> Binding {
    Binding::new(
        "mediamonkey",
        vec![
            WatchedPoint { name: "trg_song_insert", table: "songs", when: TriggerTiming::AfterInsert, id_expression: "new.id" },
            WatchedPoint { name: "trg_playlist_insert", table: "playlists", when: TriggerTiming::AfterInsert, id_expression: "new.id" },
            WatchedPoint { name: "trg_playlist_rename", table: "playlists", when: TriggerTiming::AfterUpdate, id_expression: "new.id" },
            WatchedPoint { name: "trg_playlist_delete", table: "playlists", when: TriggerTiming::AfterDelete, id_expression: "old.id" },
            WatchedPoint { name: "trg_playlist_entry_insert", table: "playlist_entries", when: TriggerTiming::AfterInsert, id_expression: "new.id" },
        ],
        vec![
            handle_song_insert,
            handle_playlist_insert,
            handle_playlist_rename,
            handle_playlist_delete,
            handle_playlist_entry_insert,
        ],
        connect,
    )
}
