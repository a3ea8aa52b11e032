//! The media-player binding: an external collaborator naming the watched
//! points and supplying their handlers for one specific media player.
//!
//! The original source resolved this via a runtime `mp_confs` dict keyed by
//! media-player-type string, with an explicit "dirty...import loop" comment
//! admitting the circularity. Per §9 this is inverted here: a `Binding` is
//! a plain data table the core's configuration layer owns, constructed by
//! whoever wires up `main`, with no dependency from core code back into any
//! specific media player's handlers.

use rusqlite::Connection;

use crate::dispatch::HandlerFn;
use crate::model::WatchedPoint;

/// Names the watched points and their handlers for one media player. The
/// ordering of `points`/`handlers` defines `change_type` indices and must
/// stay stable across runs — reordering silently breaks existing change
/// logs, since old rows' `change_type` values would resolve to different
/// handlers.
pub struct Binding {
    pub mp_type: &'static str,
    pub points: Vec<WatchedPoint>,
    pub handlers: Vec<HandlerFn>,
    pub connect: fn(&std::path::Path) -> Result<Connection, crate::error::SyncError>,
}

impl Binding {
    /// Construct a binding, checking that `points` and `handlers` are the
    /// same length (the invariant dispatch relies on by construction).
    pub fn new(
        mp_type: &'static str,
        points: Vec<WatchedPoint>,
        handlers: Vec<HandlerFn>,
        connect: fn(&std::path::Path) -> Result<Connection, crate::error::SyncError>,
    ) -> Self {
        assert_eq!(
            points.len(),
            handlers.len(),
            "binding '{mp_type}' has {} watched points but {} handlers",
            points.len(),
            handlers.len()
        );
        Self { mp_type, points, handlers, connect }
    }
}
