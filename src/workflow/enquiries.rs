//! Enquiry store: creation with documents, status transitions, reads, deletion.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use super::access::{scope_for, visible_enquiry};
use super::intake::CreateEnquiry;
use super::lifecycle::{allowed_for, check_transition, resolved_status};
use super::{Actor, WorkflowError};
use crate::db::repository;
use crate::models::enums::{AmbulanceStatus, DocumentType, EnquiryStatus, Role};
use crate::models::{Enquiry, EnquiryDetail, EnquiryDocument, EnquiryFilter, Logistics};

const SUBMITTING_ROLES: &[Role] = &[Role::Cmo, Role::Admin];
const MAX_DOCUMENTS: usize = 10;

/// An uploaded file waiting to be attached to a new enquiry.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub doc_type: DocumentType,
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn validate_documents(documents: &[NewDocument]) -> Result<(), WorkflowError> {
    if documents.len() > MAX_DOCUMENTS {
        return Err(WorkflowError::validation(format!(
            "At most {MAX_DOCUMENTS} documents may be attached"
        )));
    }
    for doc in documents {
        if doc.original_name.trim().is_empty() {
            return Err(WorkflowError::validation("Document file name is required"));
        }
        if doc.bytes.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Document '{}' is empty",
                doc.original_name
            )));
        }
    }
    Ok(())
}

/// Keep only characters that are safe in a file name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}

fn check_references(conn: &Connection, logistics: &Logistics) -> Result<(), WorkflowError> {
    if repository::get_district(conn, &logistics.district_id)?.is_none() {
        return Err(WorkflowError::validation("Unknown district"));
    }
    let source = repository::get_hospital(conn, &logistics.source_hospital_id)?
        .ok_or_else(|| WorkflowError::validation("Unknown source hospital"))?;
    if repository::get_hospital(conn, &logistics.destination_hospital_id)?.is_none() {
        return Err(WorkflowError::validation("Unknown destination hospital"));
    }
    if source.district_id != logistics.district_id {
        return Err(WorkflowError::validation(
            "Source hospital is not in the selected district",
        ));
    }
    Ok(())
}

/// Submit a new enquiry. It starts PENDING with a fresh daily code.
///
/// Files are written under `upload_root/<enquiry id>/` inside the same unit of
/// work as the rows; if anything fails the directory is removed again.
pub fn create(
    conn: &mut Connection,
    upload_root: &Path,
    command: CreateEnquiry,
    documents: Vec<NewDocument>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<EnquiryDetail, WorkflowError> {
    actor.require_role(SUBMITTING_ROLES, "submit enquiries")?;
    validate_documents(&documents)?;
    check_references(conn, &command.logistics)?;

    let enquiry_id = Uuid::new_v4();
    let doc_dir = upload_root.join(enquiry_id.to_string());
    let result = persist_new(conn, &doc_dir, enquiry_id, command, documents, actor, now);

    if result.is_err() && doc_dir.exists() {
        if let Err(e) = fs::remove_dir_all(&doc_dir) {
            tracing::warn!(path = %doc_dir.display(), error = %e, "Failed to clean up enquiry documents");
        }
    }
    result
}

fn persist_new(
    conn: &mut Connection,
    doc_dir: &Path,
    enquiry_id: Uuid,
    command: CreateEnquiry,
    documents: Vec<NewDocument>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<EnquiryDetail, WorkflowError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let enquiry = Enquiry {
        id: enquiry_id,
        enquiry_code: repository::next_enquiry_code(&tx, now.date_naive())?,
        status: EnquiryStatus::Pending,
        version: 0,
        patient: command.patient,
        identity: command.identity,
        medical: command.medical,
        logistics: command.logistics,
        contact: command.contact,
        ambulance_id: None,
        submitted_by_user_id: actor.user_id,
        created_at: now,
        updated_at: now,
    };
    repository::insert_enquiry(&tx, &enquiry)?;

    let mut stored = Vec::with_capacity(documents.len());
    if !documents.is_empty() {
        fs::create_dir_all(doc_dir).map_err(|e| WorkflowError::Storage(e.to_string()))?;
    }
    for doc in documents {
        let doc_id = Uuid::new_v4();
        let path: PathBuf =
            doc_dir.join(format!("{}_{}", doc_id.simple(), sanitize_file_name(&doc.original_name)));
        fs::write(&path, &doc.bytes).map_err(|e| WorkflowError::Storage(e.to_string()))?;

        let content_type = doc.content_type.unwrap_or_else(|| {
            mime_guess::from_path(&doc.original_name)
                .first_or_octet_stream()
                .to_string()
        });
        let record = EnquiryDocument {
            id: doc_id,
            enquiry_id,
            doc_type: doc.doc_type,
            original_name: doc.original_name,
            stored_path: path.to_string_lossy().into_owned(),
            content_type,
            size_bytes: doc.bytes.len() as i64,
            uploaded_at: now,
        };
        repository::insert_document(&tx, &record)?;
        stored.push(record);
    }

    tx.commit()?;

    tracing::info!(
        enquiry_id = %enquiry.id,
        code = %enquiry.enquiry_code,
        documents = stored.len(),
        "Enquiry submitted"
    );

    Ok(EnquiryDetail {
        allowed_transitions: allowed_for(enquiry.status, actor.role),
        enquiry,
        documents: stored,
        queries: Vec::new(),
        escalations: Vec::new(),
    })
}

// ═══════════════════════════════════════════════════════════
// Transitions
// ═══════════════════════════════════════════════════════════

pub fn forward(conn: &mut Connection, id: &Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Enquiry, WorkflowError> {
    apply_transition(conn, id, EnquiryStatus::Forwarded, None, actor, now)
}

pub fn approve(conn: &mut Connection, id: &Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Enquiry, WorkflowError> {
    apply_transition(conn, id, EnquiryStatus::Approved, None, actor, now)
}

pub fn reject(conn: &mut Connection, id: &Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Enquiry, WorkflowError> {
    apply_transition(conn, id, EnquiryStatus::Rejected, None, actor, now)
}

/// Start the transfer with an available ambulance, which becomes dispatched.
pub fn dispatch(
    conn: &mut Connection,
    id: &Uuid,
    ambulance_id: &Uuid,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Enquiry, WorkflowError> {
    apply_transition(conn, id, EnquiryStatus::InProgress, Some(*ambulance_id), actor, now)
}

/// Finish the transfer and release the ambulance.
pub fn complete(conn: &mut Connection, id: &Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Enquiry, WorkflowError> {
    apply_transition(conn, id, EnquiryStatus::Completed, None, actor, now)
}

/// Generic status change for targets that need no extra input.
pub fn transition(
    conn: &mut Connection,
    id: &Uuid,
    target: EnquiryStatus,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Enquiry, WorkflowError> {
    match target {
        EnquiryStatus::Escalated => Err(WorkflowError::validation(
            "Escalation needs a reason and an authority",
        )),
        EnquiryStatus::InProgress => Err(WorkflowError::validation(
            "Dispatch needs an ambulance",
        )),
        _ => apply_transition(conn, id, target, None, actor, now),
    }
}

fn apply_transition(
    conn: &mut Connection,
    id: &Uuid,
    requested: EnquiryStatus,
    ambulance: Option<Uuid>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Enquiry, WorkflowError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let enquiry = visible_enquiry(&tx, id, actor)?;
    let from = enquiry.status;
    check_transition(from, requested, actor.role)?;

    let target = if from == EnquiryStatus::Escalated {
        let resolved = repository::resolve_open_escalations(&tx, id, &now)?;
        tracing::debug!(enquiry_id = %id, resolved, "Escalations resolved");
        resolved_status(requested, enquiry.ambulance_id.is_some())
    } else {
        requested
    };

    let mut ambulance_id = enquiry.ambulance_id;
    match target {
        EnquiryStatus::InProgress if from != EnquiryStatus::Escalated => {
            let unit_id = ambulance.ok_or_else(|| WorkflowError::validation("Dispatch needs an ambulance"))?;
            let unit = repository::get_ambulance(&tx, &unit_id)?
                .ok_or_else(|| WorkflowError::not_found("Ambulance", unit_id))?;
            let claimed = repository::update_ambulance_status(
                &tx,
                &unit_id,
                Some(AmbulanceStatus::Available),
                AmbulanceStatus::Dispatched,
                &now,
            )?;
            if !claimed {
                return Err(WorkflowError::Conflict(format!(
                    "Ambulance {} is {}",
                    unit.call_sign, unit.status
                )));
            }
            ambulance_id = Some(unit_id);
        }
        EnquiryStatus::Completed | EnquiryStatus::Rejected => {
            if let Some(unit) = enquiry.ambulance_id {
                release_ambulance(&tx, &unit, &now)?;
            }
        }
        _ => {}
    }

    if !repository::update_enquiry_status(&tx, id, enquiry.version, target, ambulance_id.as_ref(), &now)? {
        return Err(WorkflowError::IllegalTransition { from, to: requested });
    }
    tx.commit()?;

    tracing::info!(
        enquiry_id = %id,
        from = %from,
        to = %target,
        user_id = %actor.user_id,
        "Enquiry status changed"
    );

    Ok(Enquiry {
        status: target,
        version: enquiry.version + 1,
        ambulance_id,
        updated_at: now,
        ..enquiry
    })
}

/// Hand a dispatched unit back to the pool.
fn release_ambulance(conn: &Connection, unit: &Uuid, now: &DateTime<Utc>) -> Result<(), WorkflowError> {
    let released = repository::update_ambulance_status(
        conn,
        unit,
        Some(AmbulanceStatus::Dispatched),
        AmbulanceStatus::Available,
        now,
    )?;
    if !released {
        tracing::warn!(ambulance_id = %unit, "Ambulance was no longer dispatched at release");
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Reads and deletion
// ═══════════════════════════════════════════════════════════

pub fn get_detail(conn: &Connection, id: &Uuid, actor: &Actor) -> Result<EnquiryDetail, WorkflowError> {
    let enquiry = visible_enquiry(conn, id, actor)?;
    Ok(EnquiryDetail {
        allowed_transitions: allowed_for(enquiry.status, actor.role),
        documents: repository::list_documents(conn, id)?,
        queries: repository::list_queries_for_enquiry(conn, id)?,
        escalations: repository::list_escalations(conn, id)?,
        enquiry,
    })
}

/// Enquiries visible to `actor`, narrowed by `filter`, newest first.
pub fn list(conn: &Connection, filter: &EnquiryFilter, actor: &Actor) -> Result<Vec<Enquiry>, WorkflowError> {
    Ok(repository::list_enquiries(conn, filter, &scope_for(actor))?)
}

/// Remove an enquiry with everything attached to it, including stored files.
pub fn delete(conn: &mut Connection, upload_root: &Path, id: &Uuid, actor: &Actor) -> Result<(), WorkflowError> {
    actor.require_role(&[Role::Admin], "delete enquiries")?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(enquiry) = repository::get_enquiry(&tx, id)? {
        if let (Some(unit), false) = (enquiry.ambulance_id, enquiry.status.is_terminal()) {
            release_ambulance(&tx, &unit, &Utc::now())?;
        }
    }
    let paths = repository::delete_enquiry(&tx, id)?;
    tx.commit()?;

    for path in &paths {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path, error = %e, "Failed to remove enquiry document");
        }
    }
    let doc_dir = upload_root.join(id.to_string());
    if doc_dir.exists() {
        if let Err(e) = fs::remove_dir_all(&doc_dir) {
            tracing::warn!(path = %doc_dir.display(), error = %e, "Failed to remove enquiry directory");
        }
    }

    tracing::info!(enquiry_id = %id, documents = paths.len(), "Enquiry deleted");
    Ok(())
}
