use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{uuid_from_sql, DatabaseError};
use crate::models::*;

struct HospitalRow {
    id: String,
    name: String,
    district_id: String,
    address: Option<String>,
    contact_phone: Option<String>,
}

fn hospital_from_row(row: HospitalRow) -> Result<Hospital, DatabaseError> {
    Ok(Hospital {
        id: uuid_from_sql("hospitals.id", &row.id)?,
        name: row.name,
        district_id: uuid_from_sql("hospitals.district_id", &row.district_id)?,
        address: row.address,
        contact_phone: row.contact_phone,
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HospitalRow> {
    Ok(HospitalRow {
        id: row.get(0)?,
        name: row.get(1)?,
        district_id: row.get(2)?,
        address: row.get(3)?,
        contact_phone: row.get(4)?,
    })
}

pub fn insert_hospital(conn: &Connection, hospital: &Hospital) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO hospitals (id, name, district_id, address, contact_phone)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            hospital.id.to_string(),
            hospital.name,
            hospital.district_id.to_string(),
            hospital.address,
            hospital.contact_phone,
        ],
    )?;
    Ok(())
}

pub fn get_hospital(conn: &Connection, id: &Uuid) -> Result<Option<Hospital>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, district_id, address, contact_phone FROM hospitals WHERE id = ?1",
        params![id.to_string()],
        read_row,
    );

    match result {
        Ok(row) => Ok(Some(hospital_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_hospitals(
    conn: &Connection,
    district_id: Option<&Uuid>,
) -> Result<Vec<Hospital>, DatabaseError> {
    let rows = match district_id {
        Some(district) => {
            let mut stmt = conn.prepare(
                "SELECT id, name, district_id, address, contact_phone FROM hospitals
                 WHERE district_id = ?1 ORDER BY name",
            )?;
            let rows = stmt
                .query_map(params![district.to_string()], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, name, district_id, address, contact_phone FROM hospitals ORDER BY name",
            )?;
            let rows = stmt.query_map([], read_row)?.collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    rows.into_iter().map(hospital_from_row).collect()
}
