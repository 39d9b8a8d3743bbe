use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{map_unique_violation, timestamp_from_sql, timestamp_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::Role;
use crate::models::*;

const USER_COLUMNS: &str =
    "id, name, email, phone, role, district_id, password_hash, created_at";

struct UserRow {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
    district_id: Option<String>,
    password_hash: String,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        role: row.get(4)?,
        district_id: row.get(5)?,
        password_hash: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: uuid_from_sql("users.id", &row.id)?,
        name: row.name,
        email: row.email,
        phone: row.phone,
        role: Role::from_str(&row.role)?,
        district_id: row
            .district_id
            .as_deref()
            .map(|d| uuid_from_sql("users.district_id", d))
            .transpose()?,
        password_hash: row.password_hash,
        created_at: timestamp_from_sql("users.created_at", &row.created_at)?,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, email, phone, role, district_id, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.phone,
            user.role.as_str(),
            user.district_id.map(|id| id.to_string()),
            user.password_hash,
            timestamp_to_sql(&user.created_at),
        ],
    )
    .map_err(|e| map_unique_violation(e, "Account with this email"))?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
            params![email],
            read_row,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Overwrite the mutable profile fields (everything except credentials and creation time).
pub fn update_user_profile(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    let rows = conn
        .execute(
            "UPDATE users SET name = ?2, email = ?3, phone = ?4, role = ?5, district_id = ?6
             WHERE id = ?1",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.phone,
                user.role.as_str(),
                user.district_id.map(|id| id.to_string()),
            ],
        )
        .map_err(|e| map_unique_violation(e, "Account with this email"))?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: user.id.to_string(),
        });
    }
    Ok(())
}

pub fn update_password_hash(
    conn: &Connection,
    user_id: &Uuid,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![user_id.to_string(), password_hash],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}
