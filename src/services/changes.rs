use rusqlite::Connection;

use crate::db::queries;
use crate::models::{ChangeAction, ChangeEvent, ChangeTable};
use crate::state::AppState;

/// Appends a change row. Runs on whatever connection or transaction the
/// write itself uses, so a rolled-back write leaves no trace.
pub fn log(
    conn: &Connection,
    table: ChangeTable,
    action: ChangeAction,
    record_id: &str,
) -> anyhow::Result<ChangeEvent> {
    queries::insert_change(conn, table, action, record_id)
}

/// Pushes committed changes to live subscribers.
pub fn publish(state: &AppState, events: Vec<ChangeEvent>) {
    for event in events {
        tracing::debug!(
            id = event.id,
            table = event.table.as_str(),
            action = event.action.as_str(),
            record_id = %event.record_id,
            "change published"
        );
        // No subscribers is fine
        let _ = state.changes_tx.send(event);
    }
}
