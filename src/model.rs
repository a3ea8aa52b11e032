use serde::{Deserialize, Serialize};

/// A remote object category. Each kind owns one Id Map table.
///
/// Closed at compile time: supporting a new remote object type means
/// writing a new handler, so a runtime-extensible set would buy nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Song,
    Playlist,
}

impl ItemKind {
    pub fn all() -> &'static [ItemKind] {
        &[ItemKind::Song, ItemKind::Playlist]
    }

    /// Name of the Id Map table backing this kind.
    pub fn table_name(self) -> &'static str {
        match self {
            ItemKind::Song => "GMSongIds",
            ItemKind::Playlist => "GMPlaylistIds",
        }
    }
}

/// One of {after-insert, after-update, after-delete}, naming the trigger
/// timing installed on the watched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    AfterInsert,
    AfterUpdate,
    AfterDelete,
}

impl TriggerTiming {
    pub fn as_sql(self) -> &'static str {
        match self {
            TriggerTiming::AfterInsert => "AFTER INSERT",
            TriggerTiming::AfterUpdate => "AFTER UPDATE",
            TriggerTiming::AfterDelete => "AFTER DELETE",
        }
    }
}

/// Configuration entry describing one instrumentation point.
///
/// `id_expression` is a raw SQL expression evaluated in the trigger's row
/// context (e.g. `"new.id"`, `"old.id"`, or a foreign-key column) because the
/// meaningful identifier is not uniformly `new.id` across change types.
#[derive(Debug, Clone)]
pub struct WatchedPoint {
    pub name: &'static str,
    pub table: &'static str,
    pub when: TriggerTiming,
    pub id_expression: &'static str,
}

/// A handler's side-effect contract: how a successfully-applied change
/// should affect the Id Map Store.
#[derive(Debug, Clone)]
pub enum HandlerResult {
    /// The change does not alter the local<->remote mapping.
    None,
    /// A new remote object exists; record `local_id -> remote_id` for `kind`.
    Create { kind: ItemKind, remote_id: String },
    /// The remote counterpart for `local_id` under `kind` has been removed.
    Delete { kind: ItemKind },
}

/// One row read back from the `sync2gm_changes` change log.
#[derive(Debug, Clone, Copy)]
pub struct ChangeLogRow {
    pub change_id: i64,
    pub change_type: i64,
    pub local_id: i64,
}
