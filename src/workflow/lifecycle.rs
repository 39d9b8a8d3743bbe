//! Enquiry status graph and the roles allowed to take each edge.
//!
//! ```text
//! PENDING ──SDM──▶ FORWARDED ──DM──▶ APPROVED ──ops──▶ IN_PROGRESS ──ops──▶ COMPLETED
//!    │                 │   └──DM──▶ REJECTED      │             │
//!    └─────────────────┴───────────┬───────────────┴─────────────┘
//!                                  ▼ (escalate)
//!                              ESCALATED ──DM──▶ APPROVED | REJECTED
//! ```
//!
//! A DM approving an escalated enquiry that already holds an ambulance puts
//! it back IN_PROGRESS instead of APPROVED, so the dispatch binding survives.

use crate::models::enums::{EnquiryStatus, Role};

use super::WorkflowError;

const ESCALATING_ROLES: &[Role] = &[Role::Cmo, Role::Sdm, Role::Dm, Role::Admin];
const OPERATIONS_ROLES: &[Role] = &[Role::Support, Role::Admin];

/// Roles that may move an enquiry from `from` to `to`, or `None` if the edge does not exist.
pub fn edge_roles(from: EnquiryStatus, to: EnquiryStatus) -> Option<&'static [Role]> {
    use EnquiryStatus::*;
    match (from, to) {
        (Pending, Forwarded) => Some(&[Role::Sdm]),
        (Forwarded | Escalated, Approved | Rejected) => Some(&[Role::Dm]),
        (Pending | Forwarded | Approved | InProgress, Escalated) => Some(ESCALATING_ROLES),
        (Approved, InProgress) => Some(OPERATIONS_ROLES),
        (InProgress, Completed) => Some(OPERATIONS_ROLES),
        _ => None,
    }
}

/// All statuses directly reachable from `from`.
pub fn targets(from: EnquiryStatus) -> Vec<EnquiryStatus> {
    EnquiryStatus::ALL
        .iter()
        .copied()
        .filter(|to| edge_roles(from, *to).is_some())
        .collect()
}

/// Statuses `role` may move an enquiry to from `from`. Escalation and
/// dispatch still need their own inputs.
pub fn allowed_for(from: EnquiryStatus, role: Role) -> Vec<EnquiryStatus> {
    targets(from)
        .into_iter()
        .filter(|to| edge_roles(from, *to).is_some_and(|roles| roles.contains(&role)))
        .collect()
}

/// Status an escalated enquiry actually lands in once a DM decides.
pub fn resolved_status(decision: EnquiryStatus, holds_ambulance: bool) -> EnquiryStatus {
    match decision {
        EnquiryStatus::Approved if holds_ambulance => EnquiryStatus::InProgress,
        other => other,
    }
}

/// Graph first, then role: an edge that does not exist is illegal for everyone.
pub fn check_transition(
    from: EnquiryStatus,
    to: EnquiryStatus,
    role: Role,
) -> Result<(), WorkflowError> {
    let roles = edge_roles(from, to).ok_or(WorkflowError::IllegalTransition { from, to })?;
    if roles.contains(&role) {
        Ok(())
    } else {
        Err(WorkflowError::forbidden(format!(
            "Role {role} may not move an enquiry from {from} to {to}"
        )))
    }
}
