use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(
    conn: &Connection,
    entries: &[(String, String, String, String)], // (timestamp, actor, action, outcome)
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, actor, action, outcome) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (timestamp, actor, action, outcome) in entries {
        stmt.execute(params![timestamp, actor, action, outcome])?;
    }
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![crate::db::timestamp_to_sql(&cutoff)],
    )?;
    Ok(deleted)
}
