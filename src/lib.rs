//! Change-capture and replay engine for a local media-library sync daemon.
//!
//! Five components, leaves first: the [`cursor`] store, the [`idmap`]
//! store, the [`changelog`] instrumentation, [`dispatch`], and the
//! [`poller`] loop that orchestrates them. [`config`] and [`control`] are
//! the thin glue a runnable daemon needs around that core; [`binding`] and
//! [`remote`] define the two external collaborator contracts the core
//! depends on without knowing about any specific media player or cloud
//! service. [`shutdown`] is the durable cancellation signal both the poll
//! loop and the control listener observe.

pub mod binding;
pub mod changelog;
pub mod config;
pub mod control;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod idmap;
pub mod model;
pub mod poller;
pub mod remote;
pub mod shutdown;

pub use error::SyncError;
pub use model::{ChangeLogRow, HandlerResult, ItemKind, TriggerTiming, WatchedPoint};
