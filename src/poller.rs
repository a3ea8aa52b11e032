//! The poll loop: reads the cursor, drains batches of change-log rows above
//! it, invokes the dispatcher, advances the cursor one row at a time,
//! sleeps between empty polls, and honors cooperative shutdown.
//!
//! State machine per §4.5: **Idle -> Draining -> Idle**, plus a terminal
//! **Stopped** reached when shutdown is requested. Modeled here as a plain
//! loop rather than an explicit enum-driven state machine, since every
//! transition is a straight-line consequence of the batch size read in step
//! 2 — the states exist to describe the behavior, not to be switched on.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{Connection, params};
use tracing::{debug, error, info, warn};

use crate::binding::Binding;
use crate::cursor::CursorStore;
use crate::dispatch::{self, HandlerContext};
use crate::error::SyncError;
use crate::idmap::IdMapStore;
use crate::model::{ChangeLogRow, HandlerResult};
use crate::remote::RemoteClient;
use crate::shutdown::ShutdownListener;

/// Up to this many change rows are buffered into memory per cycle. Bounds
/// the blast radius of a lost-in-flight cursor write; does not affect
/// correctness.
pub const BATCH: i64 = 10;
/// How long the loop sleeps between empty polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Backoff between retries of a locked-database select.
const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// The lenient original behavior (`finally`-advances-the-cursor-anyway) is
/// available but must be opted into; see §9's "ambiguous source behaviors".
#[derive(Debug, Clone, Copy)]
pub struct PollLoopConfig {
    pub advance_cursor_on_retry: bool,
}

impl Default for PollLoopConfig {
    fn default() -> Self {
        Self { advance_cursor_on_retry: false }
    }
}

pub struct PollLoop<'a> {
    watched_db_path: PathBuf,
    binding: &'a Binding,
    cursor: CursorStore,
    id_map: IdMapStore,
    remote: &'a dyn RemoteClient,
    shutdown: ShutdownListener,
    config: PollLoopConfig,
}

/// What happened to one batch row, for the loop's bookkeeping and for
/// tests to assert on.
enum Outcome {
    Advance,
    Halt,
}

/// What happened to one full poll cycle, for [`PollLoop::run`]'s dispatch.
enum CycleOutcome {
    Empty,
    Drained,
    ShuttingDown,
}

impl<'a> PollLoop<'a> {
    pub fn new(
        watched_db_path: impl Into<PathBuf>,
        binding: &'a Binding,
        cursor: CursorStore,
        id_map: IdMapStore,
        remote: &'a dyn RemoteClient,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            watched_db_path: watched_db_path.into(),
            binding,
            cursor,
            id_map,
            remote,
            shutdown,
            config: PollLoopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PollLoopConfig) -> Self {
        self.config = config;
        self
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.is_shutting_down()
    }

    /// Run until shutdown is requested or a fatal host-store error occurs.
    ///
    /// Step 1 of §4.5 ("if a refresh flag is set, read the cursor from
    /// disk") collapses here into always rereading: the Cursor Store is
    /// exclusively owned by this loop (§5), so there is never a concurrent
    /// writer to miss, and a disk read is cheap relative to the batch
    /// select that follows it.
    pub fn run(&self) -> Result<(), SyncError> {
        loop {
            if self.is_shutting_down() {
                info!("poll loop stopping");
                return Ok(());
            }

            match self.cycle()? {
                CycleOutcome::Empty => self.interruptible_sleep(POLL_INTERVAL),
                CycleOutcome::Drained => {}
                CycleOutcome::ShuttingDown => return Ok(()),
            }
        }
    }

    /// Run exactly one poll cycle (§4.5 steps 1-5): refresh the cursor if
    /// asked, select up to [`BATCH`] rows, and drive each through dispatch,
    /// stopping early on shutdown or a halted (retryable) row.
    ///
    /// Exposed publicly so operators and tests can single-step the loop
    /// instead of running it as a free-running background thread.
    pub fn drain_once(&self) -> Result<usize, SyncError> {
        let mut advanced = 0usize;
        let cursor_id = self.cursor.load()?;
        let conn = (self.binding.connect)(&self.watched_db_path)?;
        let batch = self.select_batch(&conn, cursor_id)?;
        for row in &batch {
            if self.is_shutting_down() {
                break;
            }
            match self.process_row(&conn, *row) {
                Outcome::Advance => {
                    if let Err(e) = self.cursor.store(row.change_id) {
                        warn!(error = %e, change_id = row.change_id, "failed to write cursor; continuing, replay is safe");
                    }
                    advanced += 1;
                }
                Outcome::Halt => {
                    if self.config.advance_cursor_on_retry {
                        let _ = self.cursor.store(row.change_id);
                        advanced += 1;
                    }
                    break;
                }
            }
        }
        Ok(advanced)
    }

    pub fn current_cursor(&self) -> Result<i64, SyncError> {
        self.cursor.load()
    }

    fn cycle(&self) -> Result<CycleOutcome, SyncError> {
        let cursor_id = self.cursor.load()?;
        let conn = (self.binding.connect)(&self.watched_db_path)?;
        let batch = self.select_batch(&conn, cursor_id)?;

        if batch.is_empty() {
            return Ok(CycleOutcome::Empty);
        }

        for row in &batch {
            if self.is_shutting_down() {
                info!(change_id = cursor_id, "shutdown requested mid-batch, stopping");
                return Ok(CycleOutcome::ShuttingDown);
            }

            match self.process_row(&conn, *row) {
                Outcome::Advance => {
                    if let Err(e) = self.cursor.store(row.change_id) {
                        warn!(error = %e, change_id = row.change_id, "failed to write cursor; continuing, replay is safe");
                    }
                }
                Outcome::Halt => {
                    if self.config.advance_cursor_on_retry {
                        let _ = self.cursor.store(row.change_id);
                    }
                    break;
                }
            }
        }
        Ok(CycleOutcome::Drained)
    }

    fn select_batch(&self, conn: &Connection, cursor_id: i64) -> Result<Vec<ChangeLogRow>, SyncError> {
        loop {
            let result = (|| -> Result<Vec<ChangeLogRow>, SyncError> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT change_id, change_type, local_id FROM {} WHERE change_id > ?1 ORDER BY change_id ASC LIMIT ?2",
                    crate::changelog::CHANGELOG_TABLE
                ))?;
                let rows = stmt
                    .query_map(params![cursor_id, BATCH], |r| {
                        Ok(ChangeLogRow { change_id: r.get(0)?, change_type: r.get(1)?, local_id: r.get(2)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })();

            match result {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_database_locked() => {
                    debug!("database locked, retrying select");
                    self.interruptible_sleep(LOCK_RETRY_BACKOFF);
                    if self.is_shutting_down() {
                        return Ok(Vec::new());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn process_row(&self, conn: &Connection, row: ChangeLogRow) -> Outcome {
        let ctx = HandlerContext {
            local_id: row.local_id,
            remote: self.remote,
            watched_db: conn,
            id_map: &self.id_map,
        };

        match dispatch::dispatch(&self.binding.handlers, row.change_type, &ctx) {
            Ok(result) => {
                if let Err(e) = self.apply_id_map(row.local_id, result) {
                    error!(error = %e, change_id = row.change_id, "id map bookkeeping failed; treating as retryable");
                    return Outcome::Halt;
                }
                Outcome::Advance
            }
            Err(SyncError::RemoteCallFailed { message, retryable: true }) => {
                warn!(change_id = row.change_id, error = %message, "remote call failed (retryable), retrying next cycle");
                Outcome::Halt
            }
            Err(SyncError::RemoteCallFailed { message, retryable: false }) => {
                warn!(change_id = row.change_id, error = %message, "remote call failed (non-retryable), skipping change");
                Outcome::Advance
            }
            Err(SyncError::Unmapped { kind, local_id }) => {
                warn!(change_id = row.change_id, ?kind, local_id, "unmapped dependency, skipping change");
                Outcome::Advance
            }
            Err(e) => {
                error!(change_id = row.change_id, error = %e, "handler error, skipping change");
                Outcome::Advance
            }
        }
    }

    fn apply_id_map(&self, local_id: i64, result: HandlerResult) -> Result<(), SyncError> {
        match result {
            HandlerResult::None => Ok(()),
            HandlerResult::Create { kind, remote_id } => self.id_map.upsert(kind, local_id, &remote_id),
            HandlerResult::Delete { kind } => self.id_map.erase(kind, local_id),
        }
    }

    fn interruptible_sleep(&self, dur: Duration) {
        self.shutdown.interruptible_sleep(dur);
    }
}
