use thiserror::Error;

/// Errors surfaced by any component of the engine.
///
/// The poll loop (see [`crate::poller`]) is the only place that classifies
/// these into a retry/skip/fatal policy; every other component just raises
/// the variant that matches what happened.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file missing or unparseable: {0}")]
    ConfigCorrupt(String),

    #[error("no remote id mapped for {kind:?} local_id={local_id}")]
    Unmapped { kind: crate::model::ItemKind, local_id: i64 },

    #[error("remote call failed: {message}")]
    RemoteCallFailed { message: String, retryable: bool },

    #[error("handler panicked or returned an unexpected error: {0}")]
    HandlerBug(String),

    #[error("invalid state: {0}")]
    State(&'static str),
}

impl From<crate::remote::RemoteCallFailure> for SyncError {
    fn from(e: crate::remote::RemoteCallFailure) -> Self {
        SyncError::RemoteCallFailed { message: e.message, retryable: e.retryable }
    }
}

impl SyncError {
    /// True if `conn.execute`-style errors indicate a transient "database is
    /// locked" condition that the poll loop should retry rather than treat
    /// as fatal.
    pub fn is_database_locked(&self) -> bool {
        matches!(
            self,
            SyncError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
        )
    }
}
