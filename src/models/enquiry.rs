use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    DocumentType, EnquiryStatus, Gender, IdentityKind, TransportationCategory, Vitals,
};
use super::{CaseQuery, Escalation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
}

/// Exactly one accepted identity document per patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum IdentityProof {
    #[serde(rename = "ABHA")]
    Abha { number: String },
    #[serde(rename = "PMJAY")]
    PmJay { number: String },
    #[serde(rename = "AADHAR_PAN")]
    AadharPan { aadhar: String, pan: String },
}

impl IdentityProof {
    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::Abha { .. } => IdentityKind::Abha,
            Self::PmJay { .. } => IdentityKind::PmJay,
            Self::AadharPan { .. } => IdentityKind::AadharPan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medical {
    pub condition: String,
    pub chief_complaint: String,
    pub vitals: Vitals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logistics {
    pub source_hospital_id: Uuid,
    pub destination_hospital_id: Uuid,
    pub district_id: Uuid,
    pub transportation_category: TransportationCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: Uuid,
    pub enquiry_code: String,
    pub status: EnquiryStatus,
    /// Bumped on every status change; guards concurrent transitions.
    pub version: i64,
    pub patient: Patient,
    pub identity: IdentityProof,
    pub medical: Medical,
    pub logistics: Logistics,
    pub contact: Contact,
    pub ambulance_id: Option<Uuid>,
    pub submitted_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnquiryDocument {
    pub id: Uuid,
    pub enquiry_id: Uuid,
    pub doc_type: DocumentType,
    pub original_name: String,
    pub stored_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Full view of one enquiry with everything hanging off it.
#[derive(Debug, Clone, Serialize)]
pub struct EnquiryDetail {
    #[serde(flatten)]
    pub enquiry: Enquiry,
    pub documents: Vec<EnquiryDocument>,
    pub queries: Vec<CaseQuery>,
    pub escalations: Vec<Escalation>,
    /// Statuses the caller may move this enquiry to.
    pub allowed_transitions: Vec<EnquiryStatus>,
}
