//! Instrumentation: converts mutations on a set of watched tables into an
//! append-only change log inside the same database, via one `AFTER` trigger
//! per watched point.
//!
//! Grounded on `create_trigger`/`create_service_table`/`attach`/`detach` in
//! the original `sync2gm` source, generalized from Python string formatting
//! to `rusqlite::Connection::execute_batch` over owned SQL strings.

use rusqlite::Connection;

use crate::error::SyncError;
use crate::model::WatchedPoint;

pub const CHANGELOG_TABLE: &str = "sync2gm_changes";

fn trigger_name(point: &WatchedPoint) -> &'static str {
    point.name
}

fn create_table_sql(num_points: usize) -> String {
    format!(
        "CREATE TABLE {table} (
            change_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            change_type INTEGER NOT NULL CHECK (change_type BETWEEN 0 AND {max_type}),
            local_id INTEGER NOT NULL
        )",
        table = CHANGELOG_TABLE,
        max_type = num_points.saturating_sub(1),
    )
}

fn create_trigger_sql(change_type: usize, point: &WatchedPoint) -> String {
    format!(
        "CREATE TRIGGER {name} {when} ON {table}
         BEGIN
             INSERT INTO {changelog} (change_type, local_id) VALUES ({change_type}, {id_expr});
         END",
        name = trigger_name(point),
        when = point.when.as_sql(),
        table = point.table,
        changelog = CHANGELOG_TABLE,
        change_type = change_type,
        id_expr = point.id_expression,
    )
}

/// Install the private change-log table and one trigger per `points` entry.
/// All-or-nothing: any failure removes whatever was installed before
/// returning the error.
pub fn attach(conn: &Connection, points: &[WatchedPoint]) -> Result<(), SyncError> {
    match attach_inner(conn, points) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Best-effort cleanup; the original error is what we report.
            let _ = detach(conn, points);
            Err(e)
        }
    }
}

fn attach_inner(conn: &Connection, points: &[WatchedPoint]) -> Result<(), SyncError> {
    conn.execute_batch(&create_table_sql(points.len()))?;
    for (change_type, point) in points.iter().enumerate() {
        conn.execute_batch(&create_trigger_sql(change_type, point))?;
    }
    Ok(())
}

/// Drop every known trigger and the change-log table. Tolerates objects
/// that are already missing.
pub fn detach(conn: &Connection, points: &[WatchedPoint]) -> Result<(), SyncError> {
    for point in points {
        conn.execute_batch(&format!("DROP TRIGGER IF EXISTS {}", trigger_name(point)))?;
    }
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", CHANGELOG_TABLE))?;
    Ok(())
}

/// `detach` followed by `attach`, used on schema upgrades (a changed point
/// count or id-expression requires regenerating every trigger).
pub fn reattach(conn: &Connection, points: &[WatchedPoint]) -> Result<(), SyncError> {
    detach(conn, points)?;
    attach(conn, points)
}
