//! Ambulance fleet: registration, manual status changes and stats.
//!
//! Dispatch binding itself happens in the enquiry lifecycle; this module
//! only refuses manual changes that would break it.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repository;
use crate::models::enums::{AmbulanceKind, AmbulanceStatus, Role};
use crate::models::{Ambulance, AmbulanceFilter, FleetStats};
use crate::workflow::{Actor, WorkflowError};

const FLEET_ROLES: &[Role] = &[Role::Admin, Role::Support];

#[derive(Debug, Clone, Deserialize)]
pub struct AmbulanceInput {
    pub registration_number: String,
    pub call_sign: String,
    pub kind: AmbulanceKind,
    #[serde(default)]
    pub base_district_id: Option<Uuid>,
}

impl AmbulanceInput {
    fn validate(&self, conn: &Connection) -> Result<(String, String), WorkflowError> {
        let registration = self.registration_number.trim().to_uppercase();
        if registration.is_empty() {
            return Err(WorkflowError::validation("Registration number is required"));
        }
        let call_sign = self.call_sign.trim();
        if call_sign.is_empty() {
            return Err(WorkflowError::validation("Call sign is required"));
        }
        if let Some(district) = self.base_district_id {
            if repository::get_district(conn, &district)?.is_none() {
                return Err(WorkflowError::validation("Unknown base district"));
            }
        }
        Ok((registration, call_sign.to_string()))
    }
}

pub fn create(
    conn: &Connection,
    input: AmbulanceInput,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Ambulance, WorkflowError> {
    actor.require_role(FLEET_ROLES, "register ambulances")?;
    let (registration_number, call_sign) = input.validate(conn)?;
    let ambulance = Ambulance {
        id: Uuid::new_v4(),
        registration_number,
        call_sign,
        kind: input.kind,
        base_district_id: input.base_district_id,
        status: AmbulanceStatus::Available,
        created_at: now,
        updated_at: now,
    };
    repository::insert_ambulance(conn, &ambulance)?;
    tracing::info!(ambulance_id = %ambulance.id, call_sign = %ambulance.call_sign, "Ambulance registered");
    Ok(ambulance)
}

pub fn list(conn: &Connection, filter: &AmbulanceFilter) -> Result<Vec<Ambulance>, WorkflowError> {
    Ok(repository::list_ambulances(conn, filter)?)
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Ambulance, WorkflowError> {
    repository::get_ambulance(conn, id)?.ok_or_else(|| WorkflowError::not_found("Ambulance", id))
}

pub fn update(
    conn: &Connection,
    id: &Uuid,
    input: AmbulanceInput,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Ambulance, WorkflowError> {
    actor.require_role(FLEET_ROLES, "edit ambulances")?;
    let (registration_number, call_sign) = input.validate(conn)?;
    let current = get(conn, id)?;
    let ambulance = Ambulance {
        registration_number,
        call_sign,
        kind: input.kind,
        base_district_id: input.base_district_id,
        updated_at: now,
        ..current
    };
    repository::update_ambulance(conn, &ambulance)?;
    Ok(ambulance)
}

/// Manual status change. `dispatched` is only reachable through an enquiry,
/// and an ambulance flying an active case cannot be pulled off it here.
pub fn set_status(
    conn: &mut Connection,
    id: &Uuid,
    status: AmbulanceStatus,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Ambulance, WorkflowError> {
    actor.require_role(FLEET_ROLES, "change ambulance status")?;
    if status == AmbulanceStatus::Dispatched {
        return Err(WorkflowError::validation(
            "Ambulances are dispatched through an approved enquiry",
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = get(&tx, id)?;
    if repository::ambulance_on_active_case(&tx, id)? {
        return Err(WorkflowError::Conflict(format!(
            "Ambulance {} is assigned to an active enquiry",
            current.call_sign
        )));
    }
    repository::update_ambulance_status(&tx, id, Some(current.status), status, &now)?;
    tx.commit()?;

    tracing::info!(ambulance_id = %id, from = %current.status, to = %status, "Ambulance status changed");
    Ok(Ambulance {
        status,
        updated_at: now,
        ..current
    })
}

pub fn delete(conn: &mut Connection, id: &Uuid, actor: &Actor) -> Result<(), WorkflowError> {
    actor.require_role(FLEET_ROLES, "delete ambulances")?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if repository::ambulance_on_active_case(&tx, id)? {
        return Err(WorkflowError::Conflict(
            "Ambulance is assigned to an active enquiry".into(),
        ));
    }
    repository::delete_ambulance(&tx, id)?;
    tx.commit()?;
    tracing::info!(ambulance_id = %id, "Ambulance removed");
    Ok(())
}

pub fn stats(conn: &Connection) -> Result<FleetStats, WorkflowError> {
    Ok(repository::fleet_stats(conn)?)
}
