//! Districts and hospitals referenced by enquiries.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repository;
use crate::models::enums::Role;
use crate::models::{District, Hospital};
use crate::workflow::{Actor, WorkflowError};

#[derive(Debug, Clone, Deserialize)]
pub struct NewDistrict {
    pub name: String,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHospital {
    pub name: String,
    pub district_id: Uuid,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

fn required(value: &str, field: &str) -> Result<String, WorkflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn list_districts(conn: &Connection) -> Result<Vec<District>, WorkflowError> {
    Ok(repository::list_districts(conn)?)
}

pub fn create_district(conn: &Connection, input: NewDistrict, actor: &Actor) -> Result<District, WorkflowError> {
    actor.require_role(&[Role::Admin], "create districts")?;
    let district = District {
        id: Uuid::new_v4(),
        name: required(&input.name, "District name")?,
        state: required(&input.state, "State")?,
    };
    repository::insert_district(conn, &district)?;
    tracing::info!(district_id = %district.id, name = %district.name, "District created");
    Ok(district)
}

pub fn list_hospitals(conn: &Connection, district_id: Option<&Uuid>) -> Result<Vec<Hospital>, WorkflowError> {
    Ok(repository::list_hospitals(conn, district_id)?)
}

pub fn create_hospital(conn: &Connection, input: NewHospital, actor: &Actor) -> Result<Hospital, WorkflowError> {
    actor.require_role(&[Role::Admin], "create hospitals")?;
    let name = required(&input.name, "Hospital name")?;
    if repository::get_district(conn, &input.district_id)?.is_none() {
        return Err(WorkflowError::validation("Unknown district"));
    }
    let hospital = Hospital {
        id: Uuid::new_v4(),
        name,
        district_id: input.district_id,
        address: optional(input.address),
        contact_phone: optional(input.contact_phone),
    };
    repository::insert_hospital(conn, &hospital)?;
    tracing::info!(hospital_id = %hospital.id, district_id = %hospital.district_id, "Hospital created");
    Ok(hospital)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn admin() -> Actor {
        Actor { user_id: Uuid::new_v4(), role: Role::Admin, district_id: None }
    }

    #[test]
    fn admin_builds_directory() {
        let conn = open_memory_database().unwrap();
        let district = create_district(
            &conn,
            NewDistrict { name: " Chamoli ".into(), state: "Uttarakhand".into() },
            &admin(),
        )
        .unwrap();
        assert_eq!(district.name, "Chamoli");

        let hospital = create_hospital(
            &conn,
            NewHospital {
                name: "District Hospital Gopeshwar".into(),
                district_id: district.id,
                address: Some("  ".into()),
                contact_phone: Some("01372252134".into()),
            },
            &admin(),
        )
        .unwrap();
        assert_eq!(hospital.address, None);

        assert_eq!(list_districts(&conn).unwrap(), vec![district.clone()]);
        assert_eq!(list_hospitals(&conn, Some(&district.id)).unwrap(), vec![hospital]);
    }

    #[test]
    fn duplicate_district_conflicts() {
        let conn = open_memory_database().unwrap();
        let input = || NewDistrict { name: "Tehri".into(), state: "Uttarakhand".into() };
        create_district(&conn, input(), &admin()).unwrap();
        assert!(matches!(create_district(&conn, input(), &admin()), Err(WorkflowError::Conflict(_))));
    }

    #[test]
    fn non_admin_and_bad_district_rejected() {
        let conn = open_memory_database().unwrap();
        let cmo = Actor { user_id: Uuid::new_v4(), role: Role::Cmo, district_id: None };
        let err = create_district(&conn, NewDistrict { name: "X".into(), state: "Y".into() }, &cmo).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let err = create_hospital(
            &conn,
            NewHospital { name: "Nowhere".into(), district_id: Uuid::new_v4(), address: None, contact_phone: None },
            &admin(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}
