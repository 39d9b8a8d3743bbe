use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{map_unique_violation, uuid_from_sql, DatabaseError};
use crate::models::*;

pub fn insert_district(conn: &Connection, district: &District) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO districts (id, name, state) VALUES (?1, ?2, ?3)",
        params![district.id.to_string(), district.name, district.state],
    )
    .map_err(|e| map_unique_violation(e, "District"))?;
    Ok(())
}

pub fn get_district(conn: &Connection, id: &Uuid) -> Result<Option<District>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, state FROM districts WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    );

    match result {
        Ok((id, name, state)) => Ok(Some(District {
            id: uuid_from_sql("districts.id", &id)?,
            name,
            state,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_districts(conn: &Connection) -> Result<Vec<District>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name, state FROM districts ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, name, state)| {
            Ok(District {
                id: uuid_from_sql("districts.id", &id)?,
                name,
                state,
            })
        })
        .collect()
}
