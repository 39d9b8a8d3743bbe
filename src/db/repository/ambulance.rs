use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{map_unique_violation, timestamp_from_sql, timestamp_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::{AmbulanceKind, AmbulanceStatus};
use crate::models::*;

const AMBULANCE_COLUMNS: &str =
    "id, registration_number, call_sign, kind, base_district_id, status, created_at, updated_at";

struct AmbulanceRow {
    id: String,
    registration_number: String,
    call_sign: String,
    kind: String,
    base_district_id: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AmbulanceRow> {
    Ok(AmbulanceRow {
        id: row.get(0)?,
        registration_number: row.get(1)?,
        call_sign: row.get(2)?,
        kind: row.get(3)?,
        base_district_id: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn ambulance_from_row(row: AmbulanceRow) -> Result<Ambulance, DatabaseError> {
    Ok(Ambulance {
        id: uuid_from_sql("ambulances.id", &row.id)?,
        registration_number: row.registration_number,
        call_sign: row.call_sign,
        kind: AmbulanceKind::from_str(&row.kind)?,
        base_district_id: row
            .base_district_id
            .as_deref()
            .map(|id| uuid_from_sql("base_district_id", id))
            .transpose()?,
        status: AmbulanceStatus::from_str(&row.status)?,
        created_at: timestamp_from_sql("ambulances.created_at", &row.created_at)?,
        updated_at: timestamp_from_sql("ambulances.updated_at", &row.updated_at)?,
    })
}

pub fn insert_ambulance(conn: &Connection, ambulance: &Ambulance) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO ambulances (id, registration_number, call_sign, kind, base_district_id,
         status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            ambulance.id.to_string(),
            ambulance.registration_number,
            ambulance.call_sign,
            ambulance.kind.as_str(),
            ambulance.base_district_id.map(|id| id.to_string()),
            ambulance.status.as_str(),
            timestamp_to_sql(&ambulance.created_at),
            timestamp_to_sql(&ambulance.updated_at),
        ],
    )
    .map_err(|e| map_unique_violation(e, "Ambulance registration number"))?;
    Ok(())
}

pub fn get_ambulance(conn: &Connection, id: &Uuid) -> Result<Option<Ambulance>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {AMBULANCE_COLUMNS} FROM ambulances WHERE id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(ambulance_from_row).transpose()
}

pub fn list_ambulances(
    conn: &Connection,
    filter: &AmbulanceFilter,
) -> Result<Vec<Ambulance>, DatabaseError> {
    let mut sql = format!("SELECT {AMBULANCE_COLUMNS} FROM ambulances WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    if let Some(district) = filter.base_district_id {
        params_vec.push(Box::new(district.to_string()));
        sql.push_str(&format!(" AND base_district_id = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY call_sign");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(param_refs.as_slice(), read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(ambulance_from_row).collect()
}

/// Overwrite descriptive fields; status goes through `update_ambulance_status`.
pub fn update_ambulance(conn: &Connection, ambulance: &Ambulance) -> Result<(), DatabaseError> {
    let rows = conn
        .execute(
            "UPDATE ambulances SET registration_number = ?2, call_sign = ?3, kind = ?4,
             base_district_id = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                ambulance.id.to_string(),
                ambulance.registration_number,
                ambulance.call_sign,
                ambulance.kind.as_str(),
                ambulance.base_district_id.map(|id| id.to_string()),
                timestamp_to_sql(&ambulance.updated_at),
            ],
        )
        .map_err(|e| map_unique_violation(e, "Ambulance registration number"))?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Ambulance".into(),
            id: ambulance.id.to_string(),
        });
    }
    Ok(())
}

/// Set the status, optionally only if it currently equals `expected`.
/// Returns `false` if the row was missing or the expectation failed.
pub fn update_ambulance_status(
    conn: &Connection,
    id: &Uuid,
    expected: Option<AmbulanceStatus>,
    status: AmbulanceStatus,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let rows = match expected {
        Some(current) => conn.execute(
            "UPDATE ambulances SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
            params![id.to_string(), current.as_str(), status.as_str(), timestamp_to_sql(now)],
        )?,
        None => conn.execute(
            "UPDATE ambulances SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), status.as_str(), timestamp_to_sql(now)],
        )?,
    };
    Ok(rows == 1)
}

pub fn delete_ambulance(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM ambulances WHERE id = ?1", params![id.to_string()])?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Ambulance".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Whether a non-terminal enquiry still holds this ambulance. An escalated
/// case keeps the unit it was dispatched with.
pub fn ambulance_on_active_case(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM enquiries
         WHERE ambulance_id = ?1 AND status NOT IN ('COMPLETED', 'REJECTED')",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn fleet_stats(conn: &Connection) -> Result<FleetStats, DatabaseError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM ambulances GROUP BY status")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stats = FleetStats::default();
    for (status, count) in rows {
        match AmbulanceStatus::from_str(&status)? {
            AmbulanceStatus::Available => stats.available = count,
            AmbulanceStatus::Dispatched => stats.dispatched = count,
            AmbulanceStatus::Maintenance => stats.maintenance = count,
            AmbulanceStatus::OutOfService => stats.out_of_service = count,
        }
        stats.total += count;
    }
    Ok(stats)
}
