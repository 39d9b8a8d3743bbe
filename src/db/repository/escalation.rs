use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{timestamp_from_sql, timestamp_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::Authority;
use crate::models::*;

struct EscalationRow {
    id: String,
    enquiry_id: String,
    reason: String,
    escalated_to: String,
    escalated_by_user_id: String,
    created_at: String,
    resolved_at: Option<String>,
}

fn escalation_from_row(row: EscalationRow) -> Result<Escalation, DatabaseError> {
    Ok(Escalation {
        id: uuid_from_sql("escalations.id", &row.id)?,
        enquiry_id: uuid_from_sql("escalations.enquiry_id", &row.enquiry_id)?,
        reason: row.reason,
        escalated_to: Authority::from_str(&row.escalated_to)?,
        escalated_by_user_id: uuid_from_sql("escalated_by_user_id", &row.escalated_by_user_id)?,
        created_at: timestamp_from_sql("escalations.created_at", &row.created_at)?,
        resolved_at: row
            .resolved_at
            .as_deref()
            .map(|ts| timestamp_from_sql("escalations.resolved_at", ts))
            .transpose()?,
    })
}

pub fn insert_escalation(conn: &Connection, escalation: &Escalation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO escalations (id, enquiry_id, reason, escalated_to, escalated_by_user_id,
         created_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            escalation.id.to_string(),
            escalation.enquiry_id.to_string(),
            escalation.reason,
            escalation.escalated_to.as_str(),
            escalation.escalated_by_user_id.to_string(),
            timestamp_to_sql(&escalation.created_at),
            escalation.resolved_at.as_ref().map(timestamp_to_sql),
        ],
    )?;
    Ok(())
}

/// Escalation history of one enquiry, oldest first.
pub fn list_escalations(
    conn: &Connection,
    enquiry_id: &Uuid,
) -> Result<Vec<Escalation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, enquiry_id, reason, escalated_to, escalated_by_user_id, created_at, resolved_at
         FROM escalations WHERE enquiry_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map(params![enquiry_id.to_string()], |row| {
            Ok(EscalationRow {
                id: row.get(0)?,
                enquiry_id: row.get(1)?,
                reason: row.get(2)?,
                escalated_to: row.get(3)?,
                escalated_by_user_id: row.get(4)?,
                created_at: row.get(5)?,
                resolved_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(escalation_from_row).collect()
}

pub fn count_open_escalations(conn: &Connection, enquiry_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM escalations WHERE enquiry_id = ?1 AND resolved_at IS NULL",
        params![enquiry_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Close every open escalation of an enquiry. Returns how many were closed.
pub fn resolve_open_escalations(
    conn: &Connection,
    enquiry_id: &Uuid,
    now: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "UPDATE escalations SET resolved_at = ?2 WHERE enquiry_id = ?1 AND resolved_at IS NULL",
        params![enquiry_id.to_string(), timestamp_to_sql(now)],
    )?;
    Ok(rows)
}
