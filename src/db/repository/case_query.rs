use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::enquiry::push_scope;
use crate::db::{timestamp_from_sql, timestamp_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::{QueryStatus, Role};
use crate::models::*;

const QUERY_COLUMNS: &str = "q.id, q.query_code, q.enquiry_id, q.query_text, q.response_text,
    q.raised_by_user_id, q.raised_by_role, q.responded_by_user_id, q.created_at, q.responded_at";

struct CaseQueryRow {
    id: String,
    query_code: String,
    enquiry_id: String,
    query_text: String,
    response_text: Option<String>,
    raised_by_user_id: String,
    raised_by_role: String,
    responded_by_user_id: Option<String>,
    created_at: String,
    responded_at: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseQueryRow> {
    Ok(CaseQueryRow {
        id: row.get(0)?,
        query_code: row.get(1)?,
        enquiry_id: row.get(2)?,
        query_text: row.get(3)?,
        response_text: row.get(4)?,
        raised_by_user_id: row.get(5)?,
        raised_by_role: row.get(6)?,
        responded_by_user_id: row.get(7)?,
        created_at: row.get(8)?,
        responded_at: row.get(9)?,
    })
}

fn case_query_from_row(row: CaseQueryRow) -> Result<CaseQuery, DatabaseError> {
    Ok(CaseQuery {
        id: uuid_from_sql("case_queries.id", &row.id)?,
        query_code: row.query_code,
        enquiry_id: uuid_from_sql("case_queries.enquiry_id", &row.enquiry_id)?,
        query_text: row.query_text,
        response_text: row.response_text,
        raised_by_user_id: uuid_from_sql("raised_by_user_id", &row.raised_by_user_id)?,
        raised_by_role: Role::from_str(&row.raised_by_role)?,
        responded_by_user_id: row
            .responded_by_user_id
            .as_deref()
            .map(|id| uuid_from_sql("responded_by_user_id", id))
            .transpose()?,
        created_at: timestamp_from_sql("case_queries.created_at", &row.created_at)?,
        responded_at: row
            .responded_at
            .as_deref()
            .map(|ts| timestamp_from_sql("case_queries.responded_at", ts))
            .transpose()?,
    })
}

pub fn insert_case_query(conn: &Connection, query: &CaseQuery) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO case_queries (id, query_code, enquiry_id, query_text, response_text,
         raised_by_user_id, raised_by_role, responded_by_user_id, created_at, responded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            query.id.to_string(),
            query.query_code,
            query.enquiry_id.to_string(),
            query.query_text,
            query.response_text,
            query.raised_by_user_id.to_string(),
            query.raised_by_role.as_str(),
            query.responded_by_user_id.map(|id| id.to_string()),
            timestamp_to_sql(&query.created_at),
            query.responded_at.as_ref().map(timestamp_to_sql),
        ],
    )?;
    Ok(())
}

pub fn get_case_query(conn: &Connection, id: &Uuid) -> Result<Option<CaseQuery>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {QUERY_COLUMNS} FROM case_queries q WHERE q.id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(case_query_from_row).transpose()
}

/// Record a response only if none exists yet.
///
/// Single conditional UPDATE, so two concurrent responders cannot both win.
/// Returns `false` when the query was already answered (or does not exist).
pub fn respond_case_query(
    conn: &Connection,
    id: &Uuid,
    response_text: &str,
    responded_by: &Uuid,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE case_queries SET response_text = ?2, responded_by_user_id = ?3, responded_at = ?4
         WHERE id = ?1 AND response_text IS NULL",
        params![
            id.to_string(),
            response_text,
            responded_by.to_string(),
            timestamp_to_sql(now),
        ],
    )?;
    Ok(rows == 1)
}

pub fn list_queries_for_enquiry(
    conn: &Connection,
    enquiry_id: &Uuid,
) -> Result<Vec<CaseQuery>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUERY_COLUMNS} FROM case_queries q WHERE q.enquiry_id = ?1 ORDER BY q.created_at"
    ))?;
    let rows = stmt
        .query_map(params![enquiry_id.to_string()], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(case_query_from_row).collect()
}

/// Queries visible under `scope`, joined with the enquiry and raiser fields.
///
/// Only the SQL-friendly parts of the filter are applied here (scope, enquiry,
/// status, raiser role); search, date buckets, sorting and paging happen on
/// the returned views.
pub fn list_case_query_views(
    conn: &Connection,
    scope: &AccessScope,
    enquiry_id: Option<&Uuid>,
    status: Option<QueryStatus>,
    role: Option<Role>,
) -> Result<Vec<CaseQueryView>, DatabaseError> {
    let mut sql = format!(
        "SELECT {QUERY_COLUMNS}, e.enquiry_code, e.patient_name, u.name
         FROM case_queries q
         JOIN enquiries e ON e.id = q.enquiry_id
         JOIN users u ON u.id = q.raised_by_user_id
         WHERE 1=1"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    push_scope(&mut sql, &mut params_vec, scope);

    if let Some(enquiry) = enquiry_id {
        params_vec.push(Box::new(enquiry.to_string()));
        sql.push_str(&format!(" AND q.enquiry_id = ?{}", params_vec.len()));
    }
    match status {
        Some(QueryStatus::Pending) => sql.push_str(" AND q.response_text IS NULL"),
        Some(QueryStatus::Responded) => sql.push_str(" AND q.response_text IS NOT NULL"),
        None => {}
    }
    if let Some(role) = role {
        params_vec.push(Box::new(role.as_str()));
        sql.push_str(&format!(" AND q.raised_by_role = ?{}", params_vec.len()));
    }

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok((
                read_row(row)?,
                row.get::<_, String>(10)?,
                row.get::<_, String>(11)?,
                row.get::<_, String>(12)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(row, enquiry_code, patient_name, raised_by_name)| {
            Ok(CaseQueryView {
                query: case_query_from_row(row)?,
                enquiry_code,
                patient_name,
                raised_by_name,
            })
        })
        .collect()
}

/// Next human-readable query code for the given day, e.g. `QRY-20261019-0003`.
pub fn next_query_code(conn: &Connection, day: NaiveDate) -> Result<String, DatabaseError> {
    let prefix = format!("QRY-{}-", day.format("%Y%m%d"));
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM case_queries WHERE query_code LIKE ?1 || '%'",
        params![prefix],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}{:04}", count + 1))
}
