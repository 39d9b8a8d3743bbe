//! Role-scoped visibility of enquiries and everything attached to them.
//!
//! The same `AccessScope` drives the SQL predicate used by listings and the
//! in-memory check used by single-record fetches, so a record that does not
//! appear in a list cannot be fetched by guessing its id either. Out-of-scope
//! fetches fail exactly like missing records (`NotFound`).

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::WorkflowError;
use crate::db::repository;
use crate::models::enums::Role;
use crate::models::{AccessScope, Enquiry};

/// The authenticated caller, built once per request by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub district_id: Option<Uuid>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Fail with `Forbidden` unless the actor holds one of `roles`.
    pub fn require_role(&self, roles: &[Role], action: &str) -> Result<(), WorkflowError> {
        if self.has_role(roles) {
            Ok(())
        } else {
            Err(WorkflowError::forbidden(format!(
                "Role {} may not {action}",
                self.role
            )))
        }
    }
}

/// Visibility scope of an actor.
pub fn scope_for(actor: &Actor) -> AccessScope {
    match actor.role {
        Role::Cmo => AccessScope::SubmittedBy(actor.user_id),
        Role::Sdm | Role::Dm => match actor.district_id {
            Some(district) => AccessScope::District(district),
            None => AccessScope::Nothing,
        },
        Role::Admin | Role::Support => AccessScope::All,
    }
}

impl AccessScope {
    pub fn admits(&self, enquiry: &Enquiry) -> bool {
        self.admits_parts(&enquiry.submitted_by_user_id, &enquiry.logistics.district_id)
    }

    pub fn admits_parts(&self, submitted_by: &Uuid, district_id: &Uuid) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::SubmittedBy(user) => user == submitted_by,
            AccessScope::District(district) => district == district_id,
            AccessScope::Nothing => false,
        }
    }
}

pub fn can_see(actor: &Actor, enquiry: &Enquiry) -> bool {
    scope_for(actor).admits(enquiry)
}

/// Fetch an enquiry the actor is allowed to see.
pub fn visible_enquiry(
    conn: &Connection,
    id: &Uuid,
    actor: &Actor,
) -> Result<Enquiry, WorkflowError> {
    match repository::get_enquiry(conn, id)? {
        Some(enquiry) if can_see(actor, &enquiry) => Ok(enquiry),
        Some(_) => {
            tracing::debug!(enquiry_id = %id, user_id = %actor.user_id, "Out-of-scope enquiry fetch");
            Err(WorkflowError::not_found("Enquiry", id))
        }
        None => Err(WorkflowError::not_found("Enquiry", id)),
    }
}
