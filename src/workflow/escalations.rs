//! Escalation ledger.
//!
//! An enquiry holds at most one open escalation; it stays open until a DM
//! approves or rejects the escalated enquiry.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use super::access::visible_enquiry;
use super::lifecycle::check_transition;
use super::{Actor, WorkflowError};
use crate::db::repository;
use crate::models::enums::{Authority, EnquiryStatus};
use crate::models::{Enquiry, Escalation};

const MAX_REASON_LEN: usize = 2000;

/// Escalate an enquiry to a named authority.
///
/// Returns the new escalation and the enquiry as it stands afterwards.
pub fn escalate(
    conn: &mut Connection,
    enquiry_id: &Uuid,
    reason: &str,
    escalated_to: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(Escalation, Enquiry), WorkflowError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(WorkflowError::validation("Escalation reason is required"));
    }
    if reason.len() > MAX_REASON_LEN {
        return Err(WorkflowError::validation(format!(
            "Escalation reason must be at most {MAX_REASON_LEN} characters"
        )));
    }
    let authority: Authority = escalated_to.trim().parse().map_err(|_| {
        let names: Vec<&str> = Authority::ALL.iter().map(Authority::as_str).collect();
        WorkflowError::validation(format!(
            "Unknown authority '{escalated_to}', expected one of: {}",
            names.join(", ")
        ))
    })?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let enquiry = visible_enquiry(&tx, enquiry_id, actor)?;
    check_transition(enquiry.status, EnquiryStatus::Escalated, actor.role)?;
    if repository::count_open_escalations(&tx, enquiry_id)? > 0 {
        return Err(WorkflowError::IllegalTransition {
            from: enquiry.status,
            to: EnquiryStatus::Escalated,
        });
    }

    let escalation = Escalation {
        id: Uuid::new_v4(),
        enquiry_id: *enquiry_id,
        reason: reason.to_string(),
        escalated_to: authority,
        escalated_by_user_id: actor.user_id,
        created_at: now,
        resolved_at: None,
    };
    repository::insert_escalation(&tx, &escalation)?;

    let from = enquiry.status;
    if !repository::update_enquiry_status(
        &tx,
        enquiry_id,
        enquiry.version,
        EnquiryStatus::Escalated,
        enquiry.ambulance_id.as_ref(),
        &now,
    )? {
        return Err(WorkflowError::IllegalTransition {
            from,
            to: EnquiryStatus::Escalated,
        });
    }
    tx.commit()?;

    tracing::info!(
        enquiry_id = %enquiry_id,
        from = %from,
        authority = %authority,
        user_id = %actor.user_id,
        "Enquiry escalated"
    );

    let updated = Enquiry {
        status: EnquiryStatus::Escalated,
        version: enquiry.version + 1,
        updated_at: now,
        ..enquiry
    };
    Ok((escalation, updated))
}

/// Escalation history of an enquiry the actor can see, oldest first.
pub fn list_for_enquiry(
    conn: &Connection,
    enquiry_id: &Uuid,
    actor: &Actor,
) -> Result<Vec<Escalation>, WorkflowError> {
    visible_enquiry(conn, enquiry_id, actor)?;
    Ok(repository::list_escalations(conn, enquiry_id)?)
}
